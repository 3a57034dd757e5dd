//! Notification API endpoints
//!
//! Banner notifications:
//! - GET /api/notifications?audience= - Public read of active,
//!   unexpired banners, filtered to the given audience plus `all`
//! - POST /api/admin/notifications - Create a banner
//! - PUT /api/admin/notifications - Update a banner
//! - DELETE /api/admin/notifications?id= - Remove a banner

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use crate::api::middleware::{log_admin_action, ApiError, AppState, AuthenticatedUser};
use crate::models::{Audience, NewNotification, Notification, NotificationPatch};

/// Query parameters for the public read
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub audience: Option<String>,
}

/// Query parameters for deletion
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<i64>,
}

/// Request body for the admin update
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub id: i64,
    #[serde(flatten)]
    pub patch: NotificationPatch,
}

/// Build the public notifications router
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_visible))
}

/// Build the admin notifications router
pub fn admin_router() -> Router<AppState> {
    Router::new().route(
        "/",
        post(create_notification)
            .put(update_notification)
            .delete(delete_notification),
    )
}

/// GET /api/notifications?audience= - Active, unexpired banners
async fn list_visible(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let audience = match query.audience.as_deref() {
        Some(raw) => Some(
            Audience::from_str(raw)
                .map_err(|_| ApiError::bad_request(format!("Invalid audience: {}", raw)))?,
        ),
        None => None,
    };

    let notifications = state
        .notification_repo
        .list_visible(audience, Utc::now())
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(notifications))
}

/// POST /api/admin/notifications - Create a banner
async fn create_notification(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<NewNotification>,
) -> Result<impl IntoResponse, ApiError> {
    if body.title.trim().is_empty() || body.message.trim().is_empty() {
        return Err(ApiError::bad_request("Title and message are required"));
    }

    let created = state
        .notification_repo
        .create(&body, Some(actor.id))
        .await
        .map_err(ApiError::internal)?;

    log_admin_action(
        &state,
        &actor,
        &format!("Created notification \"{}\"", created.title),
        &headers,
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/notifications - Update a banner
async fn update_notification(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<Notification>, ApiError> {
    let mut notification = state
        .notification_repo
        .get_by_id(body.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if let Some(title) = body.patch.title {
        notification.title = title;
    }
    if let Some(message) = body.patch.message {
        notification.message = message;
    }
    if let Some(kind) = body.patch.kind {
        notification.kind = kind;
    }
    if let Some(audience) = body.patch.audience {
        notification.audience = audience;
    }
    if let Some(is_active) = body.patch.is_active {
        notification.is_active = is_active;
    }
    if let Some(expires_at) = body.patch.expires_at {
        // Explicit null clears the expiry
        notification.expires_at = expires_at;
    }

    let updated = state
        .notification_repo
        .update(&notification)
        .await
        .map_err(ApiError::internal)?;

    log_admin_action(
        &state,
        &actor,
        &format!("Updated notification \"{}\"", updated.title),
        &headers,
    )
    .await;

    Ok(Json(updated))
}

/// DELETE /api/admin/notifications?id= - Remove a banner
async fn delete_notification(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("Notification id is required"))?;

    let deleted = state
        .notification_repo
        .delete(id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::not_found("Notification not found"));
    }

    log_admin_action(&state, &actor, &format!("Deleted notification #{}", id), &headers).await;

    Ok(Json(json!({ "message": "Notification deleted" })))
}
