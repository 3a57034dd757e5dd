//! Weather proxy API endpoints
//!
//! Public pass-throughs to the external weather provider:
//! - GET /api/weather?city= | ?lat=&lon= - Current conditions plus a
//!   best-effort air-quality index
//! - GET /api/forecast?city= | ?lat=&lon= - 5-day forecast
//! - GET /api/search?q= - Geocoder city search
//!
//! A by-name weather lookup also bumps the matching featured city's
//! search counter, best-effort.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::weather::{CitySuggestion, WeatherQuery};

/// Query parameters for weather and forecast lookups
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Query parameters for city search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Build the public weather router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/weather", get(current_weather))
        .route("/forecast", get(forecast))
        .route("/search", get(search_cities))
}

/// GET /api/weather - Current conditions
async fn current_weather(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let lookup = WeatherQuery::from_params(query.city, query.lat, query.lon)?;
    let payload = state.weather_service.current(&lookup).await?;

    if let Some(name) = lookup.city_name() {
        if let Err(e) = state.featured_repo.record_search(name).await {
            tracing::warn!("Failed to record city search: {}", e);
        }
    }

    Ok(Json(payload))
}

/// GET /api/forecast - 5-day forecast
async fn forecast(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let lookup = WeatherQuery::from_params(query.city, query.lat, query.lon)?;
    let payload = state.weather_service.forecast(&lookup).await?;
    Ok(Json(payload))
}

/// GET /api/search - Geocoder city search; empty query answers `[]`
async fn search_cities(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CitySuggestion>>, ApiError> {
    let suggestions = state.weather_service.search(&query.q).await?;
    Ok(Json(suggestions))
}
