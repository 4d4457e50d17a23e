// handler/admin_handler.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::ticketdb::TicketFilter,
    dtos::{
        ticketdtos::{
            AdminTicketQueryDto, AssignTicketDto, CreateCommentDto, UpdateTicketStatusDto,
        },
        userdtos::{
            FilterUserDto, RequestQueryDto, UpdateUserRoleDto, UpdateUserStatusDto, UserData,
            UserResponseDto,
        },
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    service::user_service::DeleteOutcome,
    AppState,
};

pub fn admin_handler() -> Router {
    Router::new()
        .route("/tickets", get(list_tickets))
        .route("/tickets/stats", get(ticket_statistics))
        .route("/tickets/:ticket_id", get(get_ticket).delete(delete_ticket))
        .route("/tickets/:ticket_id/status", post(update_ticket_status))
        .route("/tickets/:ticket_id/comment", post(add_comment))
        .route("/tickets/:ticket_id/assign", post(assign_ticket))
        .route("/attachments/*key", get(inspect_attachment))
        .route("/users", get(list_users))
        .route("/users/:user_id", get(get_user).delete(delete_user))
        .route("/users/:user_id/role", put(update_user_role))
        .route("/users/:user_id/status", put(update_user_status))
        .route("/users/:user_id/verify-email", put(verify_user_email))
}

pub async fn list_tickets(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(params): Query<AdminTicketQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let filter = TicketFilter {
        status: params.status,
        user_id: params.user_id,
        search: params.search,
        created_from: params.created_from,
        created_to: params.created_to,
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(10),
    };
    let page = filter.page;
    let limit = filter.limit;

    let (tickets, total) = app_state
        .ticket_service
        .list_tickets(&auth.user, filter)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "tickets": tickets,
            "page": page,
            "limit": limit,
            "total": total
        }
    })))
}

pub async fn ticket_statistics(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let stats = app_state.ticket_service.statistics(&auth.user).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": stats
    })))
}

pub async fn get_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let details = app_state
        .ticket_service
        .get_ticket(ticket_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": details
    })))
}

pub async fn update_ticket_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<UpdateTicketStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state
        .ticket_service
        .update_status(ticket_id, &auth.user, body.status)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": ticket
    })))
}

pub async fn add_comment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<CreateCommentDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let comment = app_state
        .ticket_service
        .add_comment(ticket_id, &auth.user, &body.comment)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": comment
    })))
}

pub async fn assign_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<AssignTicketDto>,
) -> Result<impl IntoResponse, HttpError> {
    let ticket = app_state
        .ticket_service
        .assign_ticket(ticket_id, &auth.user, body.assigned_to)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": ticket
    })))
}

pub async fn delete_ticket(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(ticket_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .ticket_service
        .delete_ticket(ticket_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Ticket deleted"
    })))
}

// Report both sides of an attachment: the database row and whether the
// storage object is still there.
pub async fn inspect_attachment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let (attachment, exists, metadata) = app_state
        .ticket_service
        .inspect_attachment(&key, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "attachment": attachment,
            "object_exists": exists,
            "object_metadata": metadata
        }
    })))
}

pub async fn list_users(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(params): Query<RequestQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);

    let (users, total) = app_state
        .user_service
        .list_users(&auth.user, page, limit)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "users": FilterUserDto::filter_users(&users),
            "page": page,
            "limit": limit,
            "total": total
        }
    })))
}

pub async fn get_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state.user_service.get_user(user_id).await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

pub async fn update_user_role(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserRoleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .user_service
        .update_role(user_id, &auth.user, body.role)
        .await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

pub async fn update_user_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .user_service
        .update_status(user_id, &auth.user, body.status)
        .await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

pub async fn verify_user_email(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state
        .user_service
        .verify_email(user_id, &auth.user)
        .await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

pub async fn delete_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state
        .user_service
        .delete_user(user_id, &auth.user)
        .await?;

    let message = match outcome {
        DeleteOutcome::Deleted => "User deleted",
        DeleteOutcome::Deactivated(_) => "User owns tickets and was deactivated instead",
    };

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": message
    })))
}
