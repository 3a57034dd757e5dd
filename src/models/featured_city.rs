//! Featured city model
//!
//! Cities curated by admins for the dashboard landing page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A curated city shown on the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct FeaturedCity {
    pub id: i64,
    pub name: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_active: bool,
    pub search_count: i64,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a featured city
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeaturedCity {
    pub name: String,
    pub country: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Admin update (named fields only)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeaturedCityPatch {
    pub name: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}
