// service/user_service.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    db::{db::DBClient, userdb::UserExt},
    models::usermodel::{
        validate_email, validate_name, validate_phone, User, UserRole, UserStatus,
    },
    service::error::ServiceError,
    utils::{password, token},
};

#[derive(Debug, Clone)]
pub struct UserService {
    db_client: Arc<DBClient>,
    jwt_secret: String,
    jwt_maxage_minutes: i64,
}

pub enum DeleteOutcome {
    Deleted,
    /// The user owns tickets and was soft-deactivated instead.
    Deactivated(User),
}

impl UserService {
    pub fn new(db_client: Arc<DBClient>, jwt_secret: String, jwt_maxage_minutes: i64) -> Self {
        Self {
            db_client,
            jwt_secret,
            jwt_maxage_minutes,
        }
    }

    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: Option<&str>,
        plain_password: &str,
    ) -> Result<User, ServiceError> {
        let first_name =
            validate_name(first_name, "First name").map_err(ServiceError::Validation)?;
        let last_name = validate_name(last_name, "Last name").map_err(ServiceError::Validation)?;
        let email = validate_email(email).map_err(ServiceError::Validation)?;
        let phone = match phone {
            Some(phone) if !phone.trim().is_empty() => {
                Some(validate_phone(phone).map_err(ServiceError::Validation)?)
            }
            _ => None,
        };

        if self.db_client.get_user(None, Some(&email)).await?.is_some() {
            return Err(ServiceError::EmailTaken);
        }

        let hashed = password::hash(plain_password)
            .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let user = self
            .db_client
            .save_user(first_name, last_name, email, phone, hashed, UserRole::Customer)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return ServiceError::EmailTaken;
                    }
                }
                ServiceError::Database(e)
            })?;

        Ok(user)
    }

    /// Verifies credentials, mints a JWT and records the login together
    /// with the stored token row the auth middleware checks against.
    pub async fn login(&self, email: &str, plain_password: &str) -> Result<(User, String), ServiceError> {
        let email = validate_email(email).map_err(|_| ServiceError::WrongCredentials)?;

        let user = self
            .db_client
            .get_user(None, Some(&email))
            .await?
            .ok_or(ServiceError::WrongCredentials)?;

        let password_matches = password::compare(plain_password, &user.password)
            .map_err(|_| ServiceError::WrongCredentials)?;

        if !password_matches {
            return Err(ServiceError::WrongCredentials);
        }

        if !user.is_active() {
            return Err(ServiceError::UserInactive(user.id));
        }

        let token = token::create_token(
            &user.id.to_string(),
            self.jwt_secret.as_bytes(),
            self.jwt_maxage_minutes * 60,
        )
        .map_err(|e| ServiceError::Validation(e.to_string()))?;

        let expires_at = Utc::now() + Duration::minutes(self.jwt_maxage_minutes);
        self.db_client.record_login(user.id, &token, expires_at).await?;

        Ok((user, token))
    }

    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        self.db_client.delete_auth_token(token).await?;
        Ok(())
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, ServiceError> {
        self.db_client
            .get_user(Some(user_id), None)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))
    }

    pub async fn list_users(
        &self,
        caller: &User,
        page: u32,
        limit: usize,
    ) -> Result<(Vec<User>, i64), ServiceError> {
        self.require_admin(caller)?;

        let users = self.db_client.get_users(page, limit).await?;
        let total = self.db_client.get_user_count().await?;

        Ok((users, total))
    }

    /// Self or admin. Changing the email address resets the verified flag.
    pub async fn update_profile(
        &self,
        target_id: Uuid,
        caller: &User,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<User, ServiceError> {
        if caller.role != UserRole::Admin && caller.id != target_id {
            return Err(ServiceError::Forbidden);
        }

        let target = self.get_user(target_id).await?;

        let first_name =
            validate_name(first_name, "First name").map_err(ServiceError::Validation)?;
        let last_name = validate_name(last_name, "Last name").map_err(ServiceError::Validation)?;
        let email = validate_email(email).map_err(ServiceError::Validation)?;
        let phone = match phone {
            Some(phone) if !phone.trim().is_empty() => {
                Some(validate_phone(phone).map_err(ServiceError::Validation)?)
            }
            _ => None,
        };

        let email_changed = email != target.email;
        if email_changed && self.db_client.get_user(None, Some(&email)).await?.is_some() {
            return Err(ServiceError::EmailTaken);
        }

        Ok(self
            .db_client
            .update_user_profile(target_id, first_name, last_name, email, phone, email_changed)
            .await?)
    }

    pub async fn update_role(
        &self,
        target_id: Uuid,
        caller: &User,
        role: UserRole,
    ) -> Result<User, ServiceError> {
        self.require_admin(caller)?;
        self.get_user(target_id).await?;

        Ok(self.db_client.update_user_role(target_id, role).await?)
    }

    pub async fn update_status(
        &self,
        target_id: Uuid,
        caller: &User,
        status: UserStatus,
    ) -> Result<User, ServiceError> {
        self.require_admin(caller)?;
        self.get_user(target_id).await?;

        Ok(self.db_client.update_user_status(target_id, status).await?)
    }

    pub async fn verify_email(
        &self,
        target_id: Uuid,
        caller: &User,
    ) -> Result<User, ServiceError> {
        self.require_admin(caller)?;
        self.get_user(target_id).await?;

        Ok(self.db_client.verify_user_email(target_id).await?)
    }

    pub async fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let matches = password::compare(current_password, &user.password)
            .map_err(|_| ServiceError::WrongCredentials)?;

        if !matches {
            return Err(ServiceError::WrongCredentials);
        }

        let hashed =
            password::hash(new_password).map_err(|e| ServiceError::Validation(e.to_string()))?;

        self.db_client.update_user_password(user.id, hashed).await?;

        Ok(())
    }

    /// Admin-only. Users owning tickets are never hard-deleted; they are
    /// deactivated so their ticket history stays intact.
    pub async fn delete_user(
        &self,
        target_id: Uuid,
        caller: &User,
    ) -> Result<DeleteOutcome, ServiceError> {
        self.require_admin(caller)?;
        self.get_user(target_id).await?;

        if self.db_client.user_owns_tickets(target_id).await? {
            let user = self
                .db_client
                .update_user_status(target_id, UserStatus::Inactive)
                .await?;
            return Ok(DeleteOutcome::Deactivated(user));
        }

        self.db_client.delete_user(target_id).await?;

        Ok(DeleteOutcome::Deleted)
    }

    fn require_admin(&self, user: &User) -> Result<(), ServiceError> {
        if user.role != UserRole::Admin {
            return Err(ServiceError::Forbidden);
        }
        Ok(())
    }
}
