//! Notification repository

use crate::models::{Audience, NewNotification, Notification, NotificationType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Create a notification
    async fn create(&self, input: &NewNotification, created_by: Option<i64>)
        -> Result<Notification>;

    /// Get a notification by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>>;

    /// Active, unexpired notifications for the given audience
    /// (audience `None` returns everything regardless of audience), newest first
    async fn list_visible(
        &self,
        audience: Option<Audience>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>>;

    /// Every notification, newest first (admin listing / backup)
    async fn list_all(&self) -> Result<Vec<Notification>>;

    /// Persist mutable fields
    async fn update(&self, notification: &Notification) -> Result<Notification>;

    /// Delete a notification; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based notification repository
pub struct SqlxNotificationRepository {
    pool: SqlitePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_NOTIFICATION: &str = r#"
    SELECT n.id, n.title, n.message, n.type, n.audience, n.is_active, n.expires_at,
           n.created_by, u.name AS created_by_name, n.created_at, n.updated_at
    FROM notifications n
    LEFT JOIN users u ON u.id = n.created_by
"#;

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(
        &self,
        input: &NewNotification,
        created_by: Option<i64>,
    ) -> Result<Notification> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO notifications \
             (title, message, type, audience, is_active, expires_at, created_by, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)",
        )
        .bind(&input.title)
        .bind(&input.message)
        .bind(input.kind.to_string())
        .bind(input.audience.to_string())
        .bind(input.expires_at)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create notification")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Notification not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!("{} WHERE n.id = ?", SELECT_NOTIFICATION))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get notification")?;

        row.map(|r| row_to_notification(&r)).transpose()
    }

    async fn list_visible(
        &self,
        audience: Option<Audience>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let rows = match audience {
            Some(audience) => {
                sqlx::query(&format!(
                    "{} WHERE n.is_active = 1 \
                     AND (n.expires_at IS NULL OR n.expires_at > ?) \
                     AND n.audience IN (?, 'all') \
                     ORDER BY n.created_at DESC, n.id DESC",
                    SELECT_NOTIFICATION
                ))
                .bind(now)
                .bind(audience.to_string())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE n.is_active = 1 \
                     AND (n.expires_at IS NULL OR n.expires_at > ?) \
                     ORDER BY n.created_at DESC, n.id DESC",
                    SELECT_NOTIFICATION
                ))
                .bind(now)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to list notifications")?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn list_all(&self) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "{} ORDER BY n.created_at DESC, n.id DESC",
            SELECT_NOTIFICATION
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list notifications")?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn update(&self, notification: &Notification) -> Result<Notification> {
        sqlx::query(
            "UPDATE notifications \
             SET title = ?, message = ?, type = ?, audience = ?, is_active = ?, \
                 expires_at = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.to_string())
        .bind(notification.audience.to_string())
        .bind(notification.is_active)
        .bind(notification.expires_at)
        .bind(Utc::now())
        .bind(notification.id)
        .execute(&self.pool)
        .await
        .context("Failed to update notification")?;

        self.get_by_id(notification.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Notification not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete notification")?
            .rows_affected();
        Ok(affected > 0)
    }
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind_str: String = row.get("type");
    let kind = NotificationType::from_str(&kind_str)
        .with_context(|| format!("Invalid notification type in database: {}", kind_str))?;

    let audience_str: String = row.get("audience");
    let audience = Audience::from_str(&audience_str)
        .with_context(|| format!("Invalid audience in database: {}", audience_str))?;

    Ok(Notification {
        id: row.get("id"),
        title: row.get("title"),
        message: row.get("message"),
        kind,
        audience,
        is_active: row.get("is_active"),
        expires_at: row.get("expires_at"),
        created_by: row.get("created_by"),
        created_by_name: row.get("created_by_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> SqlxNotificationRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxNotificationRepository::new(pool)
    }

    fn banner(title: &str, audience: Audience) -> NewNotification {
        NewNotification {
            title: title.to_string(),
            message: "Body".to_string(),
            kind: NotificationType::Info,
            audience,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_visible_filters_audience() {
        let repo = setup().await;
        repo.create(&banner("everyone", Audience::All), None).await.unwrap();
        repo.create(&banner("staff", Audience::Admins), None).await.unwrap();
        repo.create(&banner("members", Audience::Users), None).await.unwrap();

        let now = Utc::now();
        let for_users = repo.list_visible(Some(Audience::Users), now).await.unwrap();
        let titles: Vec<_> = for_users.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"everyone"));
        assert!(titles.contains(&"members"));

        let unfiltered = repo.list_visible(None, now).await.unwrap();
        assert_eq!(unfiltered.len(), 3);
    }

    #[tokio::test]
    async fn test_visible_excludes_expired_and_inactive() {
        let repo = setup().await;
        let now = Utc::now();

        let mut expired = banner("old", Audience::All);
        expired.expires_at = Some(now - Duration::hours(1));
        repo.create(&expired, None).await.unwrap();

        let mut future = banner("fresh", Audience::All);
        future.expires_at = Some(now + Duration::hours(1));
        repo.create(&future, None).await.unwrap();

        let created = repo.create(&banner("disabled", Audience::All), None).await.unwrap();
        let mut disabled = created;
        disabled.is_active = false;
        repo.update(&disabled).await.unwrap();

        let visible = repo.list_visible(None, now).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "fresh");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup().await;
        let mut n = repo.create(&banner("initial", Audience::All), None).await.unwrap();

        n.title = "renamed".to_string();
        n.kind = NotificationType::Warning;
        let updated = repo.update(&n).await.unwrap();
        assert_eq!(updated.title, "renamed");
        assert_eq!(updated.kind, NotificationType::Warning);

        assert!(repo.delete(n.id).await.unwrap());
        assert!(repo.get_by_id(n.id).await.unwrap().is_none());
    }
}
