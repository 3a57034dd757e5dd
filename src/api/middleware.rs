//! API middleware
//!
//! Contains middleware for:
//! - Authentication (session token validation)
//! - Authorization (admin role and ban checking)
//! - Request statistics for the monitoring endpoint
//!
//! Authorization is a two-step protocol, both steps re-derived from the
//! store on every request: verify the token's signature and expiry, then
//! load the subject user and check role and ban state. The role inside
//! the token is never trusted, so promotions, demotions and bans take
//! effect on the target's next request.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::db::repositories::{
    ActivityLogRepository, FeaturedCityRepository, MessageRepository, NotificationRepository,
    UserRepository,
};
use crate::models::{actions, User};
use crate::services::settings::SettingsService;
use crate::services::stats::StatsService;
use crate::services::user::{UserService, UserServiceError};
use crate::services::weather::{WeatherService, WeatherServiceError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "token";

/// Session cookie lifetime in seconds (matches the token lifetime)
pub const SESSION_MAX_AGE_SECS: i64 = crate::services::token::TOKEN_TTL_DAYS * 24 * 60 * 60;

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics for the monitoring endpoint.
///
/// Counters use atomics; the per-endpoint map takes a short lock once per
/// request.
pub struct RequestStats {
    /// Total number of requests processed
    total_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    /// Responses with a 4xx/5xx status
    error_responses: AtomicU64,
    /// Request count per "METHOD /path"
    endpoint_counts: Mutex<BTreeMap<String, u64>>,
    /// Application start time
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            error_responses: AtomicU64::new(0),
            endpoint_counts: Mutex::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its endpoint, response time and outcome
    pub fn record(&self, endpoint: &str, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.error_responses.fetch_add(1, Ordering::Relaxed);
        }

        let mut counts = self
            .endpoint_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *counts.entry(endpoint.to_string()).or_insert(0) += 1;
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    /// Fraction of requests that returned a 4xx/5xx status
    pub fn error_rate(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.error_responses.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Snapshot of per-endpoint request counts
    pub fn endpoint_counts(&self) -> BTreeMap<String, u64> {
        self.endpoint_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub settings_service: Arc<SettingsService>,
    pub stats_service: Arc<StatsService>,
    pub weather_service: Arc<WeatherService>,
    pub user_repo: Arc<dyn UserRepository>,
    pub message_repo: Arc<dyn MessageRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub featured_repo: Arc<dyn FeaturedCityRepository>,
    pub activity_repo: Arc<dyn ActivityLogRepository>,
    pub request_stats: Arc<RequestStats>,
    /// Set the Secure attribute on session cookies
    pub secure_cookies: bool,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

// ============================================================================
// Error envelope
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_UNAVAILABLE", message)
    }

    /// Log the failure and return a generic 500; internal detail never
    /// reaches the client
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "UPSTREAM_UNAVAILABLE" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::InvalidCredentials => ApiError::bad_request(e.to_string()),
            UserServiceError::AccountSuspended => ApiError::forbidden(e.to_string()),
            UserServiceError::ValidationError(msg) => ApiError::bad_request(msg),
            UserServiceError::EmailTaken => ApiError::conflict(e.to_string()),
            UserServiceError::SelfAction(msg) => ApiError::bad_request(msg),
            UserServiceError::NotFound => ApiError::not_found(e.to_string()),
            UserServiceError::InternalError(err) => ApiError::internal(err),
        }
    }
}

impl From<WeatherServiceError> for ApiError {
    fn from(e: WeatherServiceError) -> Self {
        match e {
            WeatherServiceError::MissingQuery(msg) => ApiError::bad_request(msg),
            WeatherServiceError::CityNotFound => ApiError::not_found(e.to_string()),
            WeatherServiceError::Upstream(msg) => ApiError::upstream_unavailable(msg),
            WeatherServiceError::Internal(err) => ApiError::internal(err),
        }
    }
}

impl From<crate::services::settings::SettingsServiceError> for ApiError {
    fn from(e: crate::services::settings::SettingsServiceError) -> Self {
        ApiError::internal(e)
    }
}

// ============================================================================
// Cookies and request helpers
// ============================================================================

/// Session cookie for a freshly issued token
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Expired session cookie that clears the client's copy
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0",
        SESSION_COOKIE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extract the session token from an `Authorization: Bearer` header or
/// the session cookie (bearer wins)
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("token=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Best-effort client address from proxy headers
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(ip) = forwarded_str.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    "Unknown".to_string()
}

/// Append an admin-action audit entry; failures are logged, never
/// propagated
pub async fn log_admin_action(state: &AppState, actor: &User, details: &str, headers: &HeaderMap) {
    if let Err(e) = state
        .activity_repo
        .append(
            Some(actor.id),
            actions::ADMIN_ACTION,
            details,
            &client_ip(headers),
        )
        .await
    {
        tracing::warn!("Failed to append activity log: {}", e);
    }
}

// ============================================================================
// Middlewares
// ============================================================================

/// Optional authentication middleware.
///
/// Missing, malformed, expired or orphaned tokens leave the request
/// anonymous; this never errors. Endpoints that tolerate anonymous
/// callers (favorites read, `/auth/me`) sit behind this layer.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        if let Ok(Some(user)) = state.user_service.resolve_token(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .resolve_token(&token)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware, layered after `require_auth`.
///
/// The user was loaded from the store this request, so the role and ban
/// checks always see current state; a banned admin is locked out of the
/// back office immediately even though their token stays valid.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    if user.0.is_banned {
        return Err(ApiError::forbidden("Account suspended. Contact support."));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
///
/// Records endpoint, response time and outcome for every request with
/// minimal overhead.
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = format!("{} {}", request.method(), request.uri().path());

    let response = next.run(request).await;

    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = response.status().is_client_error() || response.status().is_server_error();
    state.request_stats.record(&endpoint, duration_us, is_error);

    response
}

// ============================================================================
// Tests
// ============================================================================
