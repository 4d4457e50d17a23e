// db/ticketdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::db::DBClient;
use crate::models::ticketmodel::*;
use crate::models::usermodel::{User, UserRole};

/// Caller identity resolved once at the repository boundary; every
/// role-sensitive query branches on this instead of re-deriving the role.
#[derive(Debug, Clone, Copy)]
pub struct ViewerScope {
    pub caller_id: Uuid,
    pub is_admin: bool,
}

impl ViewerScope {
    pub fn for_user(user: &User) -> Self {
        ViewerScope {
            caller_id: user.id,
            is_admin: user.role == UserRole::Admin,
        }
    }
}

/// Sort columns resolve through this allow-list; raw query-string values
/// never reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketSortBy {
    #[default]
    CreatedAt,
    UpdatedAt,
    Status,
    Subject,
}

impl TicketSortBy {
    pub fn as_column(&self) -> &'static str {
        match self {
            TicketSortBy::CreatedAt => "created_at",
            TicketSortBy::UpdatedAt => "updated_at",
            TicketSortBy::Status => "status",
            TicketSortBy::Subject => "subject",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketListOptions {
    pub page: u32,
    pub limit: usize,
    pub status: Option<TicketStatus>,
    pub sort_by: TicketSortBy,
    pub sort_order: SortOrder,
}

impl Default for TicketListOptions {
    fn default() -> Self {
        TicketListOptions {
            page: 1,
            limit: 10,
            status: None,
            sort_by: TicketSortBy::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// Admin-side list filter: status, owner, free-text search and date range.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub page: u32,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub s3_key: String,
    pub content_type: String,
    pub file_name: String,
}

#[async_trait]
pub trait TicketExt {
    /// Inserts the ticket row and all of its attachment rows in one
    /// transaction; a failure on any insert leaves nothing behind.
    async fn create_ticket_with_attachments(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        subject: String,
        description: String,
        attachments: &[NewAttachment],
    ) -> Result<Ticket, sqlx::Error>;

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, sqlx::Error>;

    async fn get_ticket_with_details(
        &self,
        ticket_id: Uuid,
        scope: ViewerScope,
    ) -> Result<Option<TicketDetails>, sqlx::Error>;

    async fn get_user_tickets(
        &self,
        user_id: Uuid,
        opts: TicketListOptions,
    ) -> Result<Vec<Ticket>, sqlx::Error>;

    async fn count_user_tickets(
        &self,
        user_id: Uuid,
        status: Option<TicketStatus>,
    ) -> Result<i64, sqlx::Error>;

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
    ) -> Result<Vec<TicketWithCustomer>, sqlx::Error>;

    async fn count_tickets(&self, filter: &TicketFilter) -> Result<i64, sqlx::Error>;

    async fn get_ticket_statistics(&self) -> Result<TicketStatistics, sqlx::Error>;

    /// Appends a comment and, when the comment reopens the ticket, moves
    /// the status in the same transaction.
    async fn add_ticket_comment(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        comment: String,
        reopen_to: Option<TicketStatus>,
    ) -> Result<TicketComment, sqlx::Error>;

    async fn get_ticket_comments(
        &self,
        ticket_id: Uuid,
        scope: ViewerScope,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error>;

    async fn get_ticket_attachments(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketAttachment>, sqlx::Error>;

    /// Admin scope is unrestricted; customer scope only resolves keys that
    /// hang off the caller's own tickets.
    async fn get_attachment_by_key(
        &self,
        s3_key: &str,
        scope: ViewerScope,
    ) -> Result<Option<TicketAttachment>, sqlx::Error>;

    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Ticket, sqlx::Error>;

    async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        assigned_to: Uuid,
    ) -> Result<Ticket, sqlx::Error>;

    /// Cascade delete inside one transaction: attachments, comments, then
    /// the ticket row. Returns the storage keys of the removed attachments
    /// so the caller can clean up the objects after commit.
    async fn delete_ticket(&self, ticket_id: Uuid) -> Result<Vec<String>, sqlx::Error>;
}

fn apply_ticket_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TicketFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND t.status = ");
        qb.push_bind(status);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND t.user_id = ");
        qb.push_bind(user_id);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (t.subject ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR t.description ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR u.first_name || ' ' || u.last_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR u.email ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(from) = filter.created_from {
        qb.push(" AND t.created_at >= ");
        qb.push_bind(from);
    }
    if let Some(to) = filter.created_to {
        qb.push(" AND t.created_at <= ");
        qb.push_bind(to);
    }
}

#[async_trait]
impl TicketExt for DBClient {
    async fn create_ticket_with_attachments(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        subject: String,
        description: String,
        attachments: &[NewAttachment],
    ) -> Result<Ticket, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (id, user_id, subject, description, status)
            VALUES ($1, $2, $3, $4, 'open')
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .bind(subject)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        for attachment in attachments {
            sqlx::query(
                r#"
                INSERT INTO ticket_attachments (ticket_id, s3_key, content_type, file_name)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(ticket_id)
            .bind(&attachment.s3_key)
            .bind(&attachment.content_type)
            .bind(&attachment.file_name)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: Uuid) -> Result<Option<Ticket>, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_ticket_with_details(
        &self,
        ticket_id: Uuid,
        scope: ViewerScope,
    ) -> Result<Option<TicketDetails>, sqlx::Error> {
        let (ticket, customer) = if scope.is_admin {
            let row = sqlx::query_as::<_, TicketWithCustomer>(
                r#"
                SELECT
                    t.*,
                    u.first_name || ' ' || u.last_name AS customer_name,
                    u.email AS customer_email,
                    u.phone AS customer_phone
                FROM tickets t
                JOIN users u ON t.user_id = u.id
                WHERE t.id = $1
                "#,
            )
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(row) => (
                    row.ticket,
                    Some(CustomerInfo {
                        customer_name: row.customer_name,
                        customer_email: row.customer_email,
                        customer_phone: row.customer_phone,
                    }),
                ),
                None => return Ok(None),
            }
        } else {
            let ticket = sqlx::query_as::<_, Ticket>(
                r#"
                SELECT * FROM tickets
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(ticket_id)
            .bind(scope.caller_id)
            .fetch_optional(&self.pool)
            .await?;

            match ticket {
                Some(ticket) => (ticket, None),
                None => return Ok(None),
            }
        };

        let comments = self.get_ticket_comments(ticket_id, scope).await?;
        let attachments = self.get_ticket_attachments(ticket_id).await?;

        Ok(Some(TicketDetails {
            ticket,
            customer,
            comments,
            attachments,
        }))
    }

    async fn get_user_tickets(
        &self,
        user_id: Uuid,
        opts: TicketListOptions,
    ) -> Result<Vec<Ticket>, sqlx::Error> {
        let offset = (opts.page.max(1) - 1) as i64 * opts.limit as i64;
        // Sort column and direction come from the allow-list enums, never
        // from raw request input.
        let order = format!("{} {}", opts.sort_by.as_column(), opts.sort_order.as_sql());

        match opts.status {
            Some(status) => {
                sqlx::query_as::<_, Ticket>(&format!(
                    r#"
                    SELECT * FROM tickets
                    WHERE user_id = $1 AND status = $2
                    ORDER BY {order}
                    LIMIT $3 OFFSET $4
                    "#
                ))
                .bind(user_id)
                .bind(status)
                .bind(opts.limit as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Ticket>(&format!(
                    r#"
                    SELECT * FROM tickets
                    WHERE user_id = $1
                    ORDER BY {order}
                    LIMIT $2 OFFSET $3
                    "#
                ))
                .bind(user_id)
                .bind(opts.limit as i64)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
            }
        }
    }

    async fn count_user_tickets(
        &self,
        user_id: Uuid,
        status: Option<TicketStatus>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = match status {
            Some(status) => {
                sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE user_id = $1 AND status = $2")
                    .bind(user_id)
                    .bind(status)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?,
        };

        Ok(count)
    }

    async fn list_tickets(
        &self,
        filter: &TicketFilter,
    ) -> Result<Vec<TicketWithCustomer>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT
                t.*,
                u.first_name || ' ' || u.last_name AS customer_name,
                u.email AS customer_email,
                u.phone AS customer_phone
            FROM tickets t
            JOIN users u ON t.user_id = u.id
            WHERE 1 = 1
            "#,
        );

        apply_ticket_filters(&mut qb, filter);

        let offset = (filter.page.max(1) - 1) as i64 * filter.limit as i64;
        qb.push(" ORDER BY t.created_at DESC LIMIT ");
        qb.push_bind(filter.limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        qb.build_query_as::<TicketWithCustomer>()
            .fetch_all(&self.pool)
            .await
    }

    async fn count_tickets(&self, filter: &TicketFilter) -> Result<i64, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT COUNT(*)
            FROM tickets t
            JOIN users u ON t.user_id = u.id
            WHERE 1 = 1
            "#,
        );

        apply_ticket_filters(&mut qb, filter);

        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;

        Ok(count)
    }

    async fn get_ticket_statistics(&self) -> Result<TicketStatistics, sqlx::Error> {
        sqlx::query_as::<_, TicketStatistics>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'open') AS open,
                COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
                COUNT(*) FILTER (WHERE status = 'resolved') AS resolved,
                COUNT(*) FILTER (WHERE status = 'closed') AS closed
            FROM tickets
            "#,
        )
        .fetch_one(&self.pool)
        .await
    }

    async fn add_ticket_comment(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
        comment: String,
        reopen_to: Option<TicketStatus>,
    ) -> Result<TicketComment, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let comment = sqlx::query_as::<_, TicketComment>(
            r#"
            INSERT INTO ticket_comments (ticket_id, user_id, comment)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .bind(comment)
        .fetch_one(&mut *tx)
        .await?;

        match reopen_to {
            Some(status) => {
                sqlx::query(
                    r#"
                    UPDATE tickets
                    SET status = $2, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(ticket_id)
                .bind(status)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query("UPDATE tickets SET updated_at = NOW() WHERE id = $1")
                    .bind(ticket_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(comment)
    }

    async fn get_ticket_comments(
        &self,
        ticket_id: Uuid,
        scope: ViewerScope,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        // Display names resolve server-side: the viewer's own comments as
        // "You", agent comments as "Support Agent", customers by name.
        sqlx::query_as::<_, CommentWithAuthor>(
            r#"
            SELECT
                tc.id, tc.ticket_id, tc.user_id, tc.comment, tc.created_at,
                CASE
                    WHEN tc.user_id = $2 THEN 'You'
                    WHEN u.role = 'admin'::user_role THEN 'Support Agent'
                    ELSE u.first_name || ' ' || u.last_name
                END AS display_name
            FROM ticket_comments tc
            JOIN users u ON tc.user_id = u.id
            WHERE tc.ticket_id = $1
            ORDER BY tc.created_at ASC
            "#,
        )
        .bind(ticket_id)
        .bind(scope.caller_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_ticket_attachments(
        &self,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketAttachment>, sqlx::Error> {
        sqlx::query_as::<_, TicketAttachment>(
            r#"
            SELECT * FROM ticket_attachments
            WHERE ticket_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_attachment_by_key(
        &self,
        s3_key: &str,
        scope: ViewerScope,
    ) -> Result<Option<TicketAttachment>, sqlx::Error> {
        if scope.is_admin {
            sqlx::query_as::<_, TicketAttachment>(
                r#"
                SELECT * FROM ticket_attachments
                WHERE s3_key = $1
                "#,
            )
            .bind(s3_key)
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, TicketAttachment>(
                r#"
                SELECT ta.*
                FROM ticket_attachments ta
                JOIN tickets t ON ta.ticket_id = t.id
                WHERE ta.s3_key = $1 AND t.user_id = $2
                "#,
            )
            .bind(s3_key)
            .bind(scope.caller_id)
            .fetch_optional(&self.pool)
            .await
        }
    }

    async fn update_ticket_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Ticket, sqlx::Error> {
        // Entering resolved/closed stamps resolution_time; reopening keeps
        // the previous stamp.
        sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = $2,
                resolution_time = CASE
                    WHEN $2 IN ('resolved'::ticket_status, 'closed'::ticket_status) THEN NOW()
                    ELSE resolution_time
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
    }

    async fn assign_ticket(
        &self,
        ticket_id: Uuid,
        assigned_to: Uuid,
    ) -> Result<Ticket, sqlx::Error> {
        sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET assigned_to = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ticket_id)
        .bind(assigned_to)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_ticket(&self, ticket_id: Uuid) -> Result<Vec<String>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let keys: Vec<(String,)> = sqlx::query_as(
            r#"
            DELETE FROM ticket_attachments
            WHERE ticket_id = $1
            RETURNING s3_key
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM ticket_comments WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(keys.into_iter().map(|(key,)| key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_columns_resolve_through_allow_list() {
        assert_eq!(TicketSortBy::CreatedAt.as_column(), "created_at");
        assert_eq!(TicketSortBy::UpdatedAt.as_column(), "updated_at");
        assert_eq!(TicketSortBy::Status.as_column(), "status");
        assert_eq!(TicketSortBy::Subject.as_column(), "subject");
    }

    #[test]
    fn test_sort_by_rejects_unknown_values() {
        // Query-string deserialization is the only way request input
        // reaches TicketSortBy, so unknown columns fail before any SQL.
        let parsed: Result<TicketSortBy, _> = serde_json::from_str("\"created_at\"");
        assert_eq!(parsed.unwrap(), TicketSortBy::CreatedAt);

        let injected: Result<TicketSortBy, _> =
            serde_json::from_str("\"created_at; DROP TABLE tickets\"");
        assert!(injected.is_err());
    }

    #[test]
    fn test_default_sort_is_created_at_desc() {
        let opts = TicketListOptions::default();
        assert_eq!(opts.sort_by, TicketSortBy::CreatedAt);
        assert_eq!(opts.sort_order, SortOrder::Desc);
        assert_eq!(opts.page, 1);
    }

    #[test]
    fn test_viewer_scope_from_user() {
        use crate::models::usermodel::UserStatus;
        use chrono::Utc;

        let user = User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password: "hash".to_string(),
            role: UserRole::Customer,
            status: UserStatus::Active,
            email_verified: false,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let scope = ViewerScope::for_user(&user);
        assert_eq!(scope.caller_id, user.id);
        assert!(!scope.is_admin);
    }
}
