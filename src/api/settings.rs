//! System settings API endpoints
//!
//! - GET /api/settings - Public read of the global settings that the
//!   dashboard needs before login (announcement, maintenance mode,
//!   registration gate), defaults filled in
//! - GET /api/admin/settings - Admin read of the same set
//! - POST /api/admin/settings - Partial update, upserting only the
//!   provided fields

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{log_admin_action, ApiError, AppState, AuthenticatedUser};
use crate::services::settings::{SettingsPatch, SystemSettings};

/// Build the public settings router
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(get_public_settings))
}

/// Build the admin settings router
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).post(update_settings))
}

/// GET /api/settings - Public settings with defaults filled in
async fn get_public_settings(
    State(state): State<AppState>,
) -> Result<Json<SystemSettings>, ApiError> {
    let settings = state.settings_service.get_system_settings().await?;
    Ok(Json(settings))
}

/// GET /api/admin/settings - All settings with defaults filled in
async fn get_settings(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<SystemSettings>, ApiError> {
    let settings = state.settings_service.get_system_settings().await?;
    Ok(Json(settings))
}

/// POST /api/admin/settings - Partial update
async fn update_settings(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SystemSettings>, ApiError> {
    if patch.is_empty() {
        return Err(ApiError::bad_request("No settings provided"));
    }

    let updated = state.settings_service.update(&patch).await?;

    log_admin_action(&state, &actor, "Updated system settings", &headers).await;

    Ok(Json(updated))
}
