//! Settings repository
//!
//! Key/value storage for global system settings. Values are stored as
//! JSON-encoded text so booleans and strings round-trip unchanged.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

/// A setting key-value pair
#[derive(Debug, Clone)]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for settings operations
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Get a single setting by key
    async fn get(&self, key: &str) -> Result<Option<Setting>>;

    /// Get all settings
    async fn get_all(&self) -> Result<Vec<Setting>>;

    /// Get multiple settings by keys
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, serde_json::Value>>;

    /// Set a single setting
    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<()>;

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;
}

/// SQLx-based settings repository
pub struct SqlxSettingsRepository {
    pool: SqlitePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<Setting>> {
        let row = sqlx::query("SELECT key, value, updated_at FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_setting(&r)).transpose()
    }

    async fn get_all(&self) -> Result<Vec<Setting>> {
        let rows = sqlx::query("SELECT key, value, updated_at FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_setting).collect()
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, serde_json::Value>> {
        let mut result = HashMap::new();
        for key in keys {
            if let Some(setting) = self.get(key).await? {
                result.insert(setting.key, setting.value);
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_setting(row: &sqlx::sqlite::SqliteRow) -> Result<Setting> {
    let raw: String = row.get("value");
    // Legacy plain-string values are wrapped rather than rejected
    let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));

    Ok(Setting {
        key: row.get("key"),
        value,
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use serde_json::json;

    async fn setup() -> SqlxSettingsRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxSettingsRepository::new(pool)
    }

    #[tokio::test]
    async fn test_set_get_round_trip() {
        let repo = setup().await;

        repo.set("registration_enabled", &json!(false)).await.unwrap();
        repo.set("announcement", &json!("Scheduled maintenance")).await.unwrap();

        let reg = repo.get("registration_enabled").await.unwrap().unwrap();
        assert_eq!(reg.value, json!(false));

        let ann = repo.get("announcement").await.unwrap().unwrap();
        assert_eq!(ann.value, json!("Scheduled maintenance"));

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let repo = setup().await;
        repo.set("maintenance_mode", &json!(false)).await.unwrap();
        repo.set("maintenance_mode", &json!(true)).await.unwrap();

        let value = repo.get("maintenance_mode").await.unwrap().unwrap().value;
        assert_eq!(value, json!(true));
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let repo = setup().await;
        repo.set("announcement", &json!("hi")).await.unwrap();

        let map = repo
            .get_many(&["announcement", "registration_enabled"])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["announcement"], json!("hi"));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup().await;
        repo.set("announcement", &json!("x")).await.unwrap();
        repo.delete("announcement").await.unwrap();
        assert!(repo.get("announcement").await.unwrap().is_none());
    }
}
