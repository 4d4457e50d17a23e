use thiserror::Error;
use uuid::Uuid;

use crate::{error::HttpError, service::storage::StorageError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Ticket {0} not found")]
    TicketNotFound(Uuid),

    #[error("User {0} not found")]
    UserNotFound(Uuid),

    #[error("User {0} is not active")]
    UserInactive(Uuid),

    #[error("A user with this email already exists")]
    EmailTaken,

    #[error("Email or password is wrong")]
    WrongCredentials,

    #[error("You are not allowed to perform this action")]
    Forbidden,

    // Missing and foreign attachments are reported identically so the
    // existence of other users' tickets never leaks.
    #[error("Attachment not found")]
    AttachmentNotFound,

    #[error("Ticket {0} is closed and cannot take new comments")]
    TicketClosed(Uuid),

    #[error("User {0} is not an admin and cannot be assigned tickets")]
    AssigneeNotAdmin(Uuid),

    #[error("Too many files: at most {0} attachments per ticket")]
    TooManyFiles(usize),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::TicketNotFound(_)
            | ServiceError::UserNotFound(_)
            | ServiceError::AttachmentNotFound => HttpError::not_found(error.to_string()),

            ServiceError::Validation(_)
            | ServiceError::TicketClosed(_)
            | ServiceError::AssigneeNotAdmin(_)
            | ServiceError::TooManyFiles(_)
            | ServiceError::UserInactive(_) => HttpError::bad_request(error.to_string()),

            ServiceError::Forbidden => HttpError::forbidden(error.to_string()),

            ServiceError::WrongCredentials => HttpError::unauthorized(error.to_string()),

            ServiceError::EmailTaken => HttpError::unique_constraint_violation(error.to_string()),

            ServiceError::Storage(ref inner) => match inner {
                StorageError::Upstream(_) | StorageError::Timeout(_) => {
                    HttpError::server_error(error.to_string())
                }
                _ => HttpError::bad_request(error.to_string()),
            },

            ServiceError::Database(_) => HttpError::server_error(error.to_string()),
        }
    }
}
