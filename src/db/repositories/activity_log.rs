//! Activity log repository
//!
//! Append-only storage of audit records. There is intentionally no update
//! or delete operation.

use crate::models::{ActivityLog, ActivityLogEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Activity log repository trait
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    /// Append an audit record
    async fn append(
        &self,
        user_id: Option<i64>,
        action: &str,
        details: &str,
        ip: &str,
    ) -> Result<()>;

    /// Most recent entries, newest first, joined with the actor's name/email
    async fn recent(&self, limit: i64) -> Result<Vec<ActivityLogEntry>>;

    /// Most recent raw entries, newest first (for backup export)
    async fn recent_raw(&self, limit: i64) -> Result<Vec<ActivityLog>>;

    /// Count all entries
    async fn count(&self) -> Result<i64>;

    /// Count entries created at or after `since`
    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64>;
}

/// SQLx-based activity log repository
pub struct SqlxActivityLogRepository {
    pool: SqlitePool,
}

impl SqlxActivityLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn ActivityLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ActivityLogRepository for SqlxActivityLogRepository {
    async fn append(
        &self,
        user_id: Option<i64>,
        action: &str,
        details: &str,
        ip: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO activity_logs (user_id, action, details, ip, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(action)
        .bind(details)
        .bind(ip)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to append activity log")?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<ActivityLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT l.id, l.user_id, l.action, l.details, l.ip, l.created_at,
                   u.name AS user_name, u.email AS user_email
            FROM activity_logs l
            LEFT JOIN users u ON u.id = l.user_id
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load activity logs")?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityLogEntry {
                id: row.get("id"),
                user_id: row.get("user_id"),
                user_name: row.get("user_name"),
                user_email: row.get("user_email"),
                action: row.get("action"),
                details: row.get("details"),
                ip: row.get("ip"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn recent_raw(&self, limit: i64) -> Result<Vec<ActivityLog>> {
        let rows = sqlx::query(
            "SELECT id, user_id, action, details, ip, created_at FROM activity_logs \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load activity logs")?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityLog {
                id: row.get("id"),
                user_id: row.get("user_id"),
                action: row.get("action"),
                details: row.get("details"),
                ip: row.get("ip"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM activity_logs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count activity logs")?;
        Ok(row.get("count"))
    }

    async fn count_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM activity_logs WHERE created_at >= ?")
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count activity logs")?;
        Ok(row.get("count"))
    }
}
