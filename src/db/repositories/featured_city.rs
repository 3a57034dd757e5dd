//! Featured city repository

use crate::models::{FeaturedCity, NewFeaturedCity};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Featured city repository trait
#[async_trait]
pub trait FeaturedCityRepository: Send + Sync {
    /// Create a featured city
    async fn create(&self, input: &NewFeaturedCity) -> Result<FeaturedCity>;

    /// Get a featured city by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<FeaturedCity>>;

    /// List all featured cities, by sort order then newest
    async fn list(&self) -> Result<Vec<FeaturedCity>>;

    /// Persist mutable fields
    async fn update(&self, city: &FeaturedCity) -> Result<FeaturedCity>;

    /// Delete a city; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Bump the search counter for an active city with the given name
    async fn record_search(&self, name: &str) -> Result<()>;
}

/// SQLx-based featured city repository
pub struct SqlxFeaturedCityRepository {
    pool: SqlitePool,
}

impl SqlxFeaturedCityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn FeaturedCityRepository> {
        Arc::new(Self::new(pool))
    }
}

const CITY_COLUMNS: &str = "id, name, country, description, image_url, is_active, \
                            search_count, sort_order, created_at, updated_at";

#[async_trait]
impl FeaturedCityRepository for SqlxFeaturedCityRepository {
    async fn create(&self, input: &NewFeaturedCity) -> Result<FeaturedCity> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO featured_cities \
             (name, country, description, image_url, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.country)
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create featured city")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Featured city not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<FeaturedCity>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM featured_cities WHERE id = ?",
            CITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get featured city")?;

        Ok(row.map(|r| row_to_city(&r)))
    }

    async fn list(&self) -> Result<Vec<FeaturedCity>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM featured_cities ORDER BY sort_order ASC, created_at DESC, id DESC",
            CITY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list featured cities")?;

        Ok(rows.iter().map(row_to_city).collect())
    }

    async fn update(&self, city: &FeaturedCity) -> Result<FeaturedCity> {
        sqlx::query(
            "UPDATE featured_cities \
             SET name = ?, country = ?, description = ?, image_url = ?, is_active = ?, \
                 search_count = ?, sort_order = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&city.name)
        .bind(&city.country)
        .bind(&city.description)
        .bind(&city.image_url)
        .bind(city.is_active)
        .bind(city.search_count)
        .bind(city.sort_order)
        .bind(Utc::now())
        .bind(city.id)
        .execute(&self.pool)
        .await
        .context("Failed to update featured city")?;

        self.get_by_id(city.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Featured city not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM featured_cities WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete featured city")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn record_search(&self, name: &str) -> Result<()> {
        sqlx::query(
            "UPDATE featured_cities SET search_count = search_count + 1 \
             WHERE name = ? COLLATE NOCASE AND is_active = 1",
        )
        .bind(name)
        .execute(&self.pool)
        .await
        .context("Failed to record city search")?;
        Ok(())
    }
}

fn row_to_city(row: &sqlx::sqlite::SqliteRow) -> FeaturedCity {
    FeaturedCity {
        id: row.get("id"),
        name: row.get("name"),
        country: row.get("country"),
        description: row.get("description"),
        image_url: row.get("image_url"),
        is_active: row.get("is_active"),
        search_count: row.get("search_count"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
