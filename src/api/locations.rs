//! Featured city API endpoints
//!
//! Back-office curation of the dashboard's featured cities:
//! - GET /api/admin/locations - Featured list plus a popularity read of
//!   the most-saved city names across all users
//! - POST /api/admin/locations - Add a featured city
//! - PUT /api/admin/locations - Update a featured city
//! - DELETE /api/admin/locations?id= - Remove a featured city

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{log_admin_action, ApiError, AppState, AuthenticatedUser};
use crate::models::{FeaturedCity, FeaturedCityPatch, NewFeaturedCity};
use crate::services::stats::rank_cities;

/// Popularity ranking size for the curation screen
const POPULARITY_LIMIT: usize = 20;

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
    pub patch: FeaturedCityPatch,
}

/// Build the admin locations router
pub fn admin_router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(list_locations)
            .post(create_location)
            .put(update_location)
            .delete(delete_location),
    )
}

/// GET /api/admin/locations - Featured cities plus saved-city popularity
async fn list_locations(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cities = state
        .featured_repo
        .list()
        .await
        .map_err(ApiError::internal)?;

    let names = state
        .user_repo
        .all_saved_city_names()
        .await
        .map_err(ApiError::internal)?;
    let popular = rank_cities(&names, POPULARITY_LIMIT);

    Ok(Json(json!({
        "featured": cities,
        "popular": popular,
    })))
}

/// POST /api/admin/locations - Add a featured city
async fn create_location(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<NewFeaturedCity>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() || body.country.trim().is_empty() {
        return Err(ApiError::bad_request("Name and country are required"));
    }

    let created = state
        .featured_repo
        .create(&body)
        .await
        .map_err(ApiError::internal)?;

    log_admin_action(
        &state,
        &actor,
        &format!("Added featured city {}", created.name),
        &headers,
    )
    .await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /api/admin/locations - Update a featured city
async fn update_location(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<UpdateRequest>,
) -> Result<Json<FeaturedCity>, ApiError> {
    let mut city = state
        .featured_repo
        .get_by_id(body.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Featured city not found"))?;

    if let Some(name) = body.patch.name {
        city.name = name;
    }
    if let Some(country) = body.patch.country {
        city.country = country;
    }
    if let Some(description) = body.patch.description {
        city.description = Some(description);
    }
    if let Some(image_url) = body.patch.image_url {
        city.image_url = Some(image_url);
    }
    if let Some(is_active) = body.patch.is_active {
        city.is_active = is_active;
    }
    if let Some(sort_order) = body.patch.sort_order {
        city.sort_order = sort_order;
    }

    let updated = state
        .featured_repo
        .update(&city)
        .await
        .map_err(ApiError::internal)?;

    log_admin_action(
        &state,
        &actor,
        &format!("Updated featured city {}", updated.name),
        &headers,
    )
    .await;

    Ok(Json(updated))
}

/// DELETE /api/admin/locations?id= - Remove a featured city
async fn delete_location(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("Featured city id is required"))?;

    let deleted = state
        .featured_repo
        .delete(id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::not_found("Featured city not found"));
    }

    log_admin_action(&state, &actor, &format!("Deleted featured city #{}", id), &headers).await;

    Ok(Json(json!({ "message": "Featured city deleted" })))
}
