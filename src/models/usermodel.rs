use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Customer,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Customer => "customer",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

impl UserStatus {
    pub fn to_str(&self) -> &str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Admins see every ticket; everyone else only their own.
    pub fn can_access_ticket(&self, ticket_owner_id: Uuid) -> bool {
        self.role == UserRole::Admin || self.id == ticket_owner_id
    }
}

/// Normalizes and validates an email address. Returns the lower-cased form.
pub fn validate_email(email: &str) -> Result<String, String> {
    let email = email.trim().to_lowercase();
    let email_regex = regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map_err(|_| "Invalid email regex".to_string())?;

    if !email_regex.is_match(&email) {
        return Err("Email is invalid".to_string());
    }
    Ok(email)
}

/// Names are trimmed, 2-50 characters, letters and spaces only.
pub fn validate_name(name: &str, field: &str) -> Result<String, String> {
    let name = name.trim().to_string();
    if name.len() < 2 || name.len() > 50 {
        return Err(format!("{} must be between 2 and 50 characters", field));
    }
    if !name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        return Err(format!("{} may only contain letters and spaces", field));
    }
    Ok(name)
}

/// Phones are optional; when present they must carry 10-15 digits once
/// separators are stripped. Returns the digits-only form.
pub fn validate_phone(phone: &str) -> Result<String, String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 || digits.len() > 15 {
        return Err("Phone number must contain between 10 and 15 digits".to_string());
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password: "hash".to_string(),
            role,
            status: UserStatus::Active,
            email_verified: false,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_email_normalizes_case() {
        assert_eq!(
            validate_email("  Ada.Obi@Example.COM "),
            Ok("ada.obi@example.com".to_string())
        );
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_name_bounds() {
        assert_eq!(validate_name("  Ada ", "First name"), Ok("Ada".to_string()));
        assert!(validate_name("A", "First name").is_err());
        assert!(validate_name(&"a".repeat(51), "First name").is_err());
        assert!(validate_name("Ada42", "First name").is_err());
        assert_eq!(
            validate_name("Mary Jane", "First name"),
            Ok("Mary Jane".to_string())
        );
    }

    #[test]
    fn test_validate_phone_strips_separators() {
        assert_eq!(
            validate_phone("+1 (415) 555-0199"),
            Ok("14155550199".to_string())
        );
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("1234567890123456").is_err());
    }

    #[test]
    fn test_can_access_ticket() {
        let admin = sample_user(UserRole::Admin);
        let customer = sample_user(UserRole::Customer);
        let other = Uuid::new_v4();

        assert!(admin.can_access_ticket(other));
        assert!(customer.can_access_ticket(customer.id));
        assert!(!customer.can_access_ticket(other));
    }
}
