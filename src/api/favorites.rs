//! Favorites API endpoints
//!
//! Per-user saved cities:
//! - GET /api/favorites - The caller's list; anonymous callers get an
//!   empty list rather than an error
//! - POST /api/favorites - Add a city (add-to-set by name)
//! - DELETE /api/favorites?name= - Remove a city by name
//!
//! The whole router sits behind the optional-auth layer; the read
//! tolerates anonymous callers while the writes insist on a session.

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{SavedCity, User};

/// Request body for adding a favorite
#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub name: String,
    pub country: Option<String>,
}

/// Query parameters for removing a favorite
#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    pub name: Option<String>,
}

/// Build the favorites router (optional_auth layer)
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(list_favorites).post(add_favorite).delete(remove_favorite),
    )
}

/// The session user, or the 401 the favorites writes answer without one
fn require_user(user: Option<Extension<AuthenticatedUser>>) -> Result<User, ApiError> {
    user.map(|Extension(AuthenticatedUser(user))| user)
        .ok_or_else(|| ApiError::unauthorized("Please login to save favorites"))
}

/// GET /api/favorites - List the caller's saved cities
async fn list_favorites(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
) -> Result<Json<Vec<SavedCity>>, ApiError> {
    let Some(Extension(AuthenticatedUser(user))) = user else {
        return Ok(Json(Vec::new()));
    };

    let cities = state
        .user_repo
        .saved_cities(user.id)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(cities))
}

/// POST /api/favorites - Save a city
///
/// Saving the same name twice is a no-op; the response reports whether
/// anything was added.
async fn add_favorite(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    Json(body): Json<AddFavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(user)?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("City name is required"));
    }

    let city = SavedCity {
        name: name.to_string(),
        country: body
            .country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from),
    };

    let added = state
        .user_repo
        .add_saved_city(user.id, &city)
        .await
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": if added { "City saved" } else { "City already saved" },
            "city": city,
        })),
    ))
}

/// DELETE /api/favorites?name= - Remove a saved city
async fn remove_favorite(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = require_user(user)?;

    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("City name is required"))?;

    let removed = state
        .user_repo
        .remove_saved_city(user.id, name)
        .await
        .map_err(ApiError::internal)?;

    if !removed {
        return Err(ApiError::not_found("City is not in your favorites"));
    }

    Ok(Json(json!({ "message": "City removed" })))
}
