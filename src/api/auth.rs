//! Authentication API endpoints
//!
//! Handles HTTP requests for sessions and registration:
//! - POST /api/auth/register - Create an account (gated by the
//!   registration setting)
//! - POST /api/auth/login - Verify credentials and issue the session
//!   cookie
//! - POST /api/auth/logout - Clear the session cookie
//! - GET /api/auth/me - Resolve the current user, anonymous-tolerant

use axum::{
    extract::{Extension, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{
    clear_session_cookie, client_ip, session_cookie, ApiError, AppState, AuthenticatedUser,
};
use crate::services::user::{LoginInput, RegisterInput};

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build anonymous-tolerant auth routes (optional_auth layer)
pub fn optional_router() -> Router<AppState> {
    Router::new().route("/me", get(get_current_user))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/logout", post(logout))
}

/// POST /api/auth/register - Create an account
///
/// The registration gate is read fresh from the settings store on every
/// call, so an admin toggle takes effect immediately. New accounts get
/// the `user` role and are not logged in automatically.
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration_enabled = state.settings_service.registration_enabled().await?;
    if !registration_enabled {
        return Err(ApiError::forbidden("Registration is currently disabled"));
    }

    let user = state
        .user_service
        .register(RegisterInput::new(body.name, body.email, body.password))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Account created. You can now log in.",
            "user": user,
        })),
    ))
}

/// POST /api/auth/login - Issue a session
///
/// On success the signed token is set as an HTTP-only, SameSite=Strict
/// cookie. Unknown email and wrong password produce the same error;
/// a banned account is told it is suspended and gets no token.
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip = client_ip(&headers);

    let (user, token) = state
        .user_service
        .login(LoginInput::new(body.email, body.password), &ip)
        .await?;

    let cookie = session_cookie(&token, state.secure_cookies);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );

    Ok((
        response_headers,
        Json(json!({
            "message": "Login successful",
            "user": user,
        })),
    ))
}

/// POST /api/auth/logout - Clear the session cookie
///
/// Tokens are not stored server-side, so logout only deletes the
/// client's copy; the token itself expires naturally.
async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cookie = clear_session_cookie(state.secure_cookies);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );

    Ok((response_headers, Json(json!({ "message": "Logged out" }))))
}

/// GET /api/auth/me - Resolve the current user
///
/// Anonymous, expired and orphaned tokens all answer `{"user": null}`
/// with 200; this endpoint never errors on a bad token.
async fn get_current_user(
    user: Option<Extension<AuthenticatedUser>>,
) -> Json<serde_json::Value> {
    match user {
        Some(Extension(AuthenticatedUser(user))) => Json(json!({ "user": user })),
        None => Json(json!({ "user": null })),
    }
}
