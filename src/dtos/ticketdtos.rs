use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::db::ticketdb::{SortOrder, TicketSortBy};
use crate::models::ticketmodel::TicketStatus;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketDto {
    #[validate(length(min = 5, max = 200, message = "Subject must be between 5-200 characters"))]
    pub subject: String,

    #[validate(length(
        min = 10,
        max = 2000,
        message = "Description must be between 10-2000 characters"
    ))]
    pub description: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentDto {
    #[validate(length(min = 1, max = 2000, message = "Comment must be between 1-2000 characters"))]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusDto {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignTicketDto {
    pub assigned_to: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TicketQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
    pub status: Option<TicketStatus>,
    pub sort_by: Option<TicketSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminTicketQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
    pub status: Option<TicketStatus>,
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub search: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}
