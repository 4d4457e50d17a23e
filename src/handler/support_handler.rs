// handler/support_handler.rs
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use tokio_util::io::ReaderStream;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::ticketdb::TicketListOptions,
    dtos::ticketdtos::{CreateCommentDto, TicketQueryDto},
    error::HttpError,
    middleware::{rate_limit, JWTAuthMiddeware, RateLimiter},
    service::storage::UploadFile,
    AppState,
};

pub fn support_handler(enquiry_limiter: RateLimiter) -> Router {
    Router::new()
        .route(
            "/make-enquiry",
            post(make_enquiry).layer(middleware::from_fn_with_state(enquiry_limiter, rate_limit)),
        )
        .route("/tickets", get(get_my_tickets))
        .route("/tickets/:ticket_id", get(get_ticket))
        .route("/tickets/:ticket_id/comment", post(add_comment))
        .route("/attachment/url/*key", get(attachment_url))
        .route("/attachment/stream/*key", get(attachment_stream))
}

// Create a support ticket, optionally with attachments (multipart form:
// subject, description, files).
pub async fn make_enquiry(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut subject: Option<String> = None;
    let mut description: Option<String> = None;
    let mut files: Vec<UploadFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(e.to_string()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("subject") => {
                subject = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| HttpError::bad_request(e.to_string()))?,
                );
            }
            Some("description") => {
                description = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| HttpError::bad_request(e.to_string()))?,
                );
            }
            Some("files") | Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| HttpError::bad_request(e.to_string()))?;

                files.push(UploadFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let subject =
        subject.ok_or_else(|| HttpError::bad_request("Missing required field: subject"))?;
    let description =
        description.ok_or_else(|| HttpError::bad_request("Missing required field: description"))?;

    let (ticket, attachments) = app_state
        .ticket_service
        .create_ticket(auth.user.id, &subject, &description, files)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "status": "success",
            "message": "Your enquiry has been received",
            "data": {
                "ticket_id": ticket.id,
                "attachments": attachments
            }
        })),
    ))
}

pub async fn get_my_tickets(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(params): Query<TicketQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let opts = TicketListOptions {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(10),
        status: params.status,
        sort_by: params.sort_by.unwrap_or_default(),
        sort_order: params.sort_order.unwrap_or_default(),
    };
    let page = opts.page;
    let limit = opts.limit;

    let (tickets, total) = app_state
        .ticket_service
        .list_my_tickets(auth.user.id, opts)
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

// Issue a short-lived signed URL for an attachment the caller may see.
pub async fn attachment_url(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let url = app_state
        .ticket_service
        .get_attachment_url(&key, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": { "url": url }
    })))
}

// Proxy the attachment bytes inline so storage credentials stay
// server-side.
pub async fn attachment_stream(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(key): Path<String>,
) -> Result<Response, HttpError> {
    let (attachment, stream) = app_state
        .ticket_service
        .stream_attachment(&key, &auth.user)
        .await?;

    let reader = ReaderStream::new(stream.into_async_read());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, attachment.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", attachment.file_name),
        )
        .body(Body::from_stream(reader))
        .map_err(|e| HttpError::server_error(e.to_string()))
}
