//! Self-service profile API endpoint
//!
//! PUT /api/user - Update the caller's own account. Only the enumerated
//! patch fields (name, preferences, profile image, password) are
//! writable; role and ban state can never be reached from here.

use axum::{
    extract::{Extension, State},
    routing::put,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{ProfilePatch, User};

/// Build the profile router (requires auth middleware)
pub fn router() -> Router<AppState> {
    Router::new().route("/", put(update_profile))
}

/// PUT /api/user - Update the current user's profile
async fn update_profile(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<User>, ApiError> {
    let updated = state.user_service.update_profile(&user, patch).await?;
    Ok(Json(updated))
}
