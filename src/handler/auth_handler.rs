// handler/auth_handler.rs
use std::sync::Arc;

use axum::{
    http::header,
    middleware,
    response::IntoResponse,
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use validator::Validate;

use crate::{
    dtos::userdtos::{FilterUserDto, LoginUserDto, RegisterUserDto, UserData, UserResponseDto, UserLoginResponseDto},
    error::{ErrorMessage, HttpError},
    middleware::{rate_limit, RateLimiter},
    AppState,
};

pub fn auth_handler(login_limiter: RateLimiter) -> Router {
    Router::new()
        .route("/register", post(register))
        .route(
            "/login",
            post(login).layer(middleware::from_fn_with_state(login_limiter, rate_limit)),
        )
        .route("/logout", post(logout))
}

pub async fn register(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let user = app_state
        .user_service
        .register(
            &body.first_name,
            &body.last_name,
            &body.email,
            body.phone.as_deref(),
            &body.password,
        )
        .await?;

    Ok(Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(&user),
        },
    }))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (user, token) = app_state
        .user_service
        .login(&body.email, &body.password)
        .await?;

    let cookie = Cookie::build(("token", token.clone()))
        .path("/")
        .max_age(time::Duration::minutes(app_state.env.jwt_maxage))
        .http_only(true)
        .build();

    let mut response = Json(UserLoginResponseDto {
        status: "success".to_string(),
        token,
        user: FilterUserDto::filter_user(&user),
    })
    .into_response();

    let cookie_value = cookie
        .to_string()
        .parse()
        .map_err(|_| HttpError::server_error("Failed to build auth cookie".to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, cookie_value);

    Ok(response)
}

pub async fn logout(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    req: axum::extract::Request,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| {
                    auth_value
                        .strip_prefix("Bearer ")
                        .map(|value| value.to_owned())
                })
        })
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_string()))?;

    app_state.user_service.logout(&token).await?;

    // Expire the cookie client-side as well.
    let cookie = Cookie::build(("token", ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .http_only(true)
        .build();

    let mut response = Json(serde_json::json!({
        "status": "success",
        "message": "Logged out"
    }))
    .into_response();

    let cookie_value = cookie
        .to_string()
        .parse()
        .map_err(|_| HttpError::server_error("Failed to build auth cookie".to_string()))?;
    response.headers_mut().append(header::SET_COOKIE, cookie_value);

    Ok(response)
}
