use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::usermodel::UserRole;

pub const SUBJECT_MIN: usize = 5;
pub const SUBJECT_MAX: usize = 200;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 2000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn to_str(&self) -> &str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn from_str(value: &str) -> Option<TicketStatus> {
        match value {
            "open" => Some(TicketStatus::Open),
            "in_progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    /// Entering resolved or closed stamps the ticket's resolution time.
    pub fn sets_resolution_time(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Closed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub assigned_to: Option<Uuid>,
    pub resolution_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// The single authorization predicate: admins, or the ticket owner.
    pub fn can_be_accessed_by(&self, user_id: Uuid, role: UserRole) -> bool {
        role == UserRole::Admin || self.user_id == user_id
    }

    pub fn can_be_updated_by(&self, user_id: Uuid, role: UserRole) -> bool {
        self.can_be_accessed_by(user_id, role)
    }

    /// Closed tickets take no further comments.
    pub fn accepts_comments(&self) -> bool {
        self.status != TicketStatus::Closed
    }

    /// A comment on a resolved ticket reopens it; the stored resolution
    /// time is left in place.
    pub fn comment_reopen_target(&self) -> Option<TicketStatus> {
        if self.status == TicketStatus::Resolved {
            Some(TicketStatus::InProgress)
        } else {
            None
        }
    }
}

/// Subject is trimmed and must be 5-200 characters.
pub fn validate_subject(subject: &str) -> Result<String, String> {
    let subject = subject.trim().to_string();
    if subject.len() < SUBJECT_MIN || subject.len() > SUBJECT_MAX {
        return Err(format!(
            "Subject must be between {} and {} characters",
            SUBJECT_MIN, SUBJECT_MAX
        ));
    }
    Ok(subject)
}

/// Description is trimmed and must be 10-2000 characters.
pub fn validate_description(description: &str) -> Result<String, String> {
    let description = description.trim().to_string();
    if description.len() < DESCRIPTION_MIN || description.len() > DESCRIPTION_MAX {
        return Err(format!(
            "Description must be between {} and {} characters",
            DESCRIPTION_MIN, DESCRIPTION_MAX
        ));
    }
    Ok(description)
}

pub fn validate_comment(comment: &str) -> Result<String, String> {
    let comment = comment.trim().to_string();
    if comment.is_empty() {
        return Err("Comment cannot be empty".to_string());
    }
    if comment.len() > DESCRIPTION_MAX {
        return Err(format!(
            "Comment must not exceed {} characters",
            DESCRIPTION_MAX
        ));
    }
    Ok(comment)
}

/// Comment author label as seen by a given viewer: your own comments are
/// "You", agent comments are anonymized for customers, and admins see the
/// customer's real name.
pub fn comment_display_name(
    viewer_id: Uuid,
    author_id: Uuid,
    author_role: UserRole,
    author_name: &str,
) -> String {
    if viewer_id == author_id {
        "You".to_string()
    } else if author_role == UserRole::Admin {
        "Support Agent".to_string()
    } else {
        author_name.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketComment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketAttachment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub s3_key: String,
    pub content_type: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub comment: TicketComment,
    pub display_name: String,
}

/// Admin list view: the ticket plus the requesting customer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketWithCustomer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: Ticket,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetails {
    pub ticket: Ticket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerInfo>,
    pub comments: Vec<CommentWithAuthor>,
    pub attachments: Vec<TicketAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustomerInfo {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TicketStatistics {
    pub total: i64,
    pub open: i64,
    pub in_progress: i64,
    pub resolved: i64,
    pub closed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ticket(status: TicketStatus) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subject: "Cannot log in".to_string(),
            description: "Login fails...".to_string(),
            status,
            assigned_to: None,
            resolution_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_boundaries() {
        assert!(validate_subject("abcd").is_err());
        assert_eq!(validate_subject("abcde"), Ok("abcde".to_string()));
        let max = "a".repeat(200);
        assert_eq!(validate_subject(&max), Ok(max.clone()));
        assert!(validate_subject(&"a".repeat(201)).is_err());
    }

    #[test]
    fn test_subject_trimmed_before_length_check() {
        assert_eq!(
            validate_subject("  Cannot log in  "),
            Ok("Cannot log in".to_string())
        );
        // 5 non-space characters padded by whitespace still passes
        assert_eq!(validate_subject("  abcde  "), Ok("abcde".to_string()));
        assert!(validate_subject("   ab   ").is_err());
    }

    #[test]
    fn test_description_boundaries() {
        assert!(validate_description(&"d".repeat(9)).is_err());
        assert!(validate_description(&"d".repeat(10)).is_ok());
        assert!(validate_description(&"d".repeat(2000)).is_ok());
        assert!(validate_description(&"d".repeat(2001)).is_err());
    }

    #[test]
    fn test_status_parsing_rejects_unknown_values() {
        assert_eq!(TicketStatus::from_str("open"), Some(TicketStatus::Open));
        assert_eq!(
            TicketStatus::from_str("in_progress"),
            Some(TicketStatus::InProgress)
        );
        assert_eq!(TicketStatus::from_str("escalated"), None);
        assert_eq!(TicketStatus::from_str(""), None);
    }

    #[test]
    fn test_resolution_stamping_statuses() {
        assert!(!TicketStatus::Open.sets_resolution_time());
        assert!(!TicketStatus::InProgress.sets_resolution_time());
        assert!(TicketStatus::Resolved.sets_resolution_time());
        assert!(TicketStatus::Closed.sets_resolution_time());
    }

    #[test]
    fn test_closed_tickets_reject_comments() {
        let ticket = sample_ticket(TicketStatus::Closed);
        assert!(!ticket.accepts_comments());

        for status in [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
        ] {
            assert!(sample_ticket(status).accepts_comments());
        }
    }

    #[test]
    fn test_comment_reopens_resolved_ticket_only() {
        assert_eq!(
            sample_ticket(TicketStatus::Resolved).comment_reopen_target(),
            Some(TicketStatus::InProgress)
        );
        assert_eq!(sample_ticket(TicketStatus::Open).comment_reopen_target(), None);
        assert_eq!(
            sample_ticket(TicketStatus::InProgress).comment_reopen_target(),
            None
        );
    }

    #[test]
    fn test_access_predicate() {
        let ticket = sample_ticket(TicketStatus::Open);
        let stranger = Uuid::new_v4();

        assert!(ticket.can_be_accessed_by(ticket.user_id, UserRole::Customer));
        assert!(!ticket.can_be_accessed_by(stranger, UserRole::Customer));
        assert!(ticket.can_be_accessed_by(stranger, UserRole::Admin));
        assert!(ticket.can_be_updated_by(ticket.user_id, UserRole::Customer));
    }

    #[test]
    fn test_empty_comment_rejected() {
        assert!(validate_comment("   ").is_err());
        assert_eq!(validate_comment(" thanks "), Ok("thanks".to_string()));
    }

    #[test]
    fn test_comment_display_name() {
        let viewer = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let customer = Uuid::new_v4();

        assert_eq!(
            comment_display_name(viewer, viewer, UserRole::Customer, "Ada Obi"),
            "You"
        );
        assert_eq!(
            comment_display_name(viewer, agent, UserRole::Admin, "Sam Agent"),
            "Support Agent"
        );
        assert_eq!(
            comment_display_name(viewer, customer, UserRole::Customer, "Ada Obi"),
            "Ada Obi"
        );
    }
}
