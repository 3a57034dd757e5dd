//! Weather proxy service
//!
//! Forwards city/coordinate queries to the external weather provider and
//! reshapes the responses. All outbound calls go through one `reqwest`
//! client with a bounded timeout; provider failures surface as
//! `Upstream`, never as a hung request. Successful payloads are kept in a
//! short-TTL in-memory cache keyed by the normalized query.

use anyhow::{Context, Result};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::WeatherConfig;

/// Maximum cached provider responses
const CACHE_CAPACITY: u64 = 1_000;

/// Result limit forwarded to the geocoder
const SEARCH_LIMIT: u32 = 5;

/// Error types for weather proxy operations
#[derive(Debug, thiserror::Error)]
pub enum WeatherServiceError {
    /// Request is missing a usable city or coordinate pair
    #[error("{0}")]
    MissingQuery(&'static str),

    /// Provider did not recognize the requested city
    #[error("City not found")]
    CityNotFound,

    /// Provider unreachable, timed out, or returned an error status
    #[error("Weather provider unavailable: {0}")]
    Upstream(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A normalized weather lookup: by city name or by coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherQuery {
    City(String),
    Coords { lat: f64, lon: f64 },
}

impl WeatherQuery {
    /// Build a query from the raw request parameters.
    ///
    /// A non-empty `city` wins; otherwise both `lat` and `lon` are
    /// required.
    pub fn from_params(
        city: Option<String>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Self, WeatherServiceError> {
        if let Some(city) = city {
            let city = city.trim();
            if !city.is_empty() {
                return Ok(WeatherQuery::City(city.to_string()));
            }
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) => Ok(WeatherQuery::Coords { lat, lon }),
            _ => Err(WeatherServiceError::MissingQuery(
                "A city name or lat/lon pair is required",
            )),
        }
    }

    /// The city name, when this is a by-name query
    pub fn city_name(&self) -> Option<&str> {
        match self {
            WeatherQuery::City(name) => Some(name),
            WeatherQuery::Coords { .. } => None,
        }
    }

    fn cache_key(&self, kind: &str) -> String {
        match self {
            WeatherQuery::City(name) => format!("{}:city:{}", kind, name.to_lowercase()),
            WeatherQuery::Coords { lat, lon } => {
                format!("{}:coords:{:.4},{:.4}", kind, lat, lon)
            }
        }
    }

    fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            WeatherQuery::City(name) => vec![("q", name.clone())],
            WeatherQuery::Coords { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        }
    }
}

/// A geocoder hit reshaped for the city-search box
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitySuggestion {
    pub name: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

/// Weather proxy over the external provider
pub struct WeatherService {
    client: reqwest::Client,
    config: WeatherConfig,
    cache: Cache<String, Arc<serde_json::Value>>,
}

impl WeatherService {
    pub fn new(config: WeatherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build weather HTTP client")?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Ok(Self {
            client,
            config,
            cache,
        })
    }

    /// Current weather for a city or coordinate pair, augmented with a
    /// best-effort air-quality index (`aqi`, null when the lookup fails).
    pub async fn current(
        &self,
        query: &WeatherQuery,
    ) -> Result<serde_json::Value, WeatherServiceError> {
        let key = query.cache_key("weather");
        if let Some(hit) = self.cache.get(&key).await {
            return Ok((*hit).clone());
        }

        let url = format!("{}/weather", self.config.api_base);
        let mut payload = self.fetch(&url, query.query_params()).await?;

        let aqi = match payload_coords(&payload) {
            Some((lat, lon)) => self.fetch_aqi(lat, lon).await,
            None => None,
        };
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(
                "aqi".to_string(),
                aqi.map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null),
            );
        }

        self.cache.insert(key, Arc::new(payload.clone())).await;
        Ok(payload)
    }

    /// 5-day forecast for a city or coordinate pair
    pub async fn forecast(
        &self,
        query: &WeatherQuery,
    ) -> Result<serde_json::Value, WeatherServiceError> {
        let key = query.cache_key("forecast");
        if let Some(hit) = self.cache.get(&key).await {
            return Ok((*hit).clone());
        }

        let url = format!("{}/forecast", self.config.api_base);
        let payload = self.fetch(&url, query.query_params()).await?;

        self.cache.insert(key, Arc::new(payload.clone())).await;
        Ok(payload)
    }

    /// Geocoder search, reshaped to `{name, country, state, lat, lon}`.
    /// An empty query returns an empty list without a provider call.
    pub async fn search(&self, q: &str) -> Result<Vec<CitySuggestion>, WeatherServiceError> {
        let q = q.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }

        let key = format!("search:{}", q.to_lowercase());
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(reshape_suggestions(&hit));
        }

        let url = format!("{}/direct", self.config.geo_base);
        let payload = self
            .fetch(
                &url,
                vec![("q", q.to_string()), ("limit", SEARCH_LIMIT.to_string())],
            )
            .await?;

        self.cache.insert(key, Arc::new(payload.clone())).await;
        Ok(reshape_suggestions(&payload))
    }

    async fn fetch(
        &self,
        url: &str,
        params: Vec<(&'static str, String)>,
    ) -> Result<serde_json::Value, WeatherServiceError> {
        let response = self
            .client
            .get(url)
            .query(&params)
            .query(&[("units", "metric"), ("appid", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(WeatherServiceError::CityNotFound);
        }
        if !status.is_success() {
            return Err(WeatherServiceError::Upstream(format!(
                "provider returned {}",
                status
            )));
        }

        response.json().await.map_err(map_reqwest_error)
    }

    /// Air-quality lookup; any failure is swallowed into `None`
    async fn fetch_aqi(&self, lat: f64, lon: f64) -> Option<i64> {
        let url = format!("{}/air_pollution", self.config.api_base);
        let result = self
            .fetch(
                &url,
                vec![("lat", lat.to_string()), ("lon", lon.to_string())],
            )
            .await;

        match result {
            Ok(payload) => extract_aqi(&payload),
            Err(e) => {
                tracing::debug!("AQI lookup failed: {}", e);
                None
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> WeatherServiceError {
    if e.is_timeout() {
        WeatherServiceError::Upstream("request timed out".to_string())
    } else {
        WeatherServiceError::Upstream(e.to_string())
    }
}

/// Coordinates embedded in a current-weather payload
fn payload_coords(payload: &serde_json::Value) -> Option<(f64, f64)> {
    let lat = payload.get("coord")?.get("lat")?.as_f64()?;
    let lon = payload.get("coord")?.get("lon")?.as_f64()?;
    Some((lat, lon))
}

/// The AQI value (1-5 scale) from an air-pollution payload
fn extract_aqi(payload: &serde_json::Value) -> Option<i64> {
    payload
        .get("list")?
        .get(0)?
        .get("main")?
        .get("aqi")?
        .as_i64()
}

/// Reshape a raw geocoder array into city suggestions; malformed entries
/// are skipped
fn reshape_suggestions(payload: &serde_json::Value) -> Vec<CitySuggestion> {
    let Some(entries) = payload.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            Some(CitySuggestion {
                name: entry.get("name")?.as_str()?.to_string(),
                country: entry
                    .get("country")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                state: entry
                    .get("state")
                    .and_then(|v| v.as_str())
                    .map(String::from),
                lat: entry.get("lat")?.as_f64()?,
                lon: entry.get("lon")?.as_f64()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_from_params_prefers_city() {
        let q = WeatherQuery::from_params(Some("Lisbon".to_string()), Some(1.0), Some(2.0))
            .unwrap();
        assert_eq!(q, WeatherQuery::City("Lisbon".to_string()));
        assert_eq!(q.city_name(), Some("Lisbon"));
    }

    #[test]
    fn test_query_from_params_falls_back_to_coords() {
        let q = WeatherQuery::from_params(Some("  ".to_string()), Some(38.7), Some(-9.1))
            .unwrap();
        assert_eq!(q, WeatherQuery::Coords { lat: 38.7, lon: -9.1 });
        assert!(q.city_name().is_none());
    }

    #[test]
    fn test_query_from_params_rejects_incomplete() {
        assert!(WeatherQuery::from_params(None, None, None).is_err());
        assert!(WeatherQuery::from_params(None, Some(1.0), None).is_err());
        assert!(WeatherQuery::from_params(Some(String::new()), None, Some(2.0)).is_err());
    }

    #[test]
    fn test_cache_key_normalizes_case() {
        let a = WeatherQuery::City("LISBON".to_string()).cache_key("weather");
        let b = WeatherQuery::City("lisbon".to_string()).cache_key("weather");
        assert_eq!(a, b);

        // Same city, different endpoint kinds stay distinct
        let c = WeatherQuery::City("lisbon".to_string()).cache_key("forecast");
        assert_ne!(a, c);
    }

    #[test]
    fn test_cache_key_rounds_coords() {
        let a = WeatherQuery::Coords { lat: 38.70001, lon: -9.10002 }.cache_key("weather");
        let b = WeatherQuery::Coords { lat: 38.70004, lon: -9.09999 }.cache_key("weather");
        assert_eq!(a, b);
    }

    #[test]
    fn test_payload_coords() {
        let payload = json!({"coord": {"lat": 51.5, "lon": -0.1}, "name": "London"});
        assert_eq!(payload_coords(&payload), Some((51.5, -0.1)));
        assert_eq!(payload_coords(&json!({"name": "London"})), None);
    }

    #[test]
    fn test_extract_aqi() {
        let payload = json!({"list": [{"main": {"aqi": 3}}]});
        assert_eq!(extract_aqi(&payload), Some(3));
        assert_eq!(extract_aqi(&json!({"list": []})), None);
        assert_eq!(extract_aqi(&json!({})), None);
    }

    #[test]
    fn test_reshape_suggestions() {
        let payload = json!([
            {"name": "London", "country": "GB", "state": "England", "lat": 51.5, "lon": -0.1},
            {"name": "London", "country": "CA", "lat": 42.9, "lon": -81.2},
            {"country": "XX"}
        ]);

        let suggestions = reshape_suggestions(&payload);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].state.as_deref(), Some("England"));
        assert!(suggestions[1].state.is_none());
        assert_eq!(suggestions[1].country, "CA");

        assert!(reshape_suggestions(&json!({"not": "an array"})).is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_query_skips_provider() {
        // api_base points nowhere; an empty query must not touch it
        let service = WeatherService::new(WeatherConfig {
            api_key: "test".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            geo_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            cache_ttl_secs: 60,
        })
        .unwrap();

        assert!(service.search("").await.unwrap().is_empty());
        assert!(service.search("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_maps_to_upstream() {
        let service = WeatherService::new(WeatherConfig {
            api_key: "test".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            geo_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
            cache_ttl_secs: 60,
        })
        .unwrap();

        let err = service
            .current(&WeatherQuery::City("Lisbon".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherServiceError::Upstream(_)));
    }
}
