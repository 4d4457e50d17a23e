// routes.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Extension, Json, Router};
use tower_http::trace::TraceLayer;
use serde_json::json;

use crate::{
    handler::{
        admin_handler::admin_handler, auth_handler::auth_handler,
        support_handler::support_handler, users_handler::users_handler,
    },
    middleware::{auth, role_check, RateLimiter},
    models::usermodel::UserRole,
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let login_limiter = RateLimiter::new(5, Duration::from_secs(3600));
    let enquiry_limiter = RateLimiter::new(10, Duration::from_secs(3600));

    // Multipart bodies carry up to max_files_per_ticket attachments plus
    // form fields.
    let upload_body_limit = app_state.env.max_upload_bytes
        * app_state.env.max_files_per_ticket
        + 64 * 1024;

    let api_route = Router::new()
        .nest("/auth", auth_handler(login_limiter))
        .nest(
            "/users",
            users_handler().layer(middleware::from_fn(auth)),
        )
        .nest(
            "/support",
            support_handler(enquiry_limiter)
                .layer(DefaultBodyLimit::max(upload_body_limit))
                .layer(middleware::from_fn(auth)),
        )
        .nest(
            "/admin",
            admin_handler()
                .layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .layer(middleware::from_fn(auth)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
