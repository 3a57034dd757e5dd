//! Contact message repository

use crate::models::{ContactMessage, MessageStatus, NewContactMessage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Contact message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Store a new contact-form submission
    async fn create(&self, input: &NewContactMessage) -> Result<ContactMessage>;

    /// Get a message by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<ContactMessage>>;

    /// List all messages, newest first
    async fn list(&self) -> Result<Vec<ContactMessage>>;

    /// Persist triage fields (status, reply, replied_by, replied_at, notes)
    async fn update(&self, message: &ContactMessage) -> Result<ContactMessage>;

    /// Delete a message; returns whether a row was removed
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count all messages
    async fn count(&self) -> Result<i64>;

    /// Count messages whose status is not `resolved`
    async fn count_unresolved(&self) -> Result<i64>;
}

/// SQLx-based contact message repository
pub struct SqlxMessageRepository {
    pool: SqlitePool,
}

impl SqlxMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: SqlitePool) -> Arc<dyn MessageRepository> {
        Arc::new(Self::new(pool))
    }
}

const MESSAGE_COLUMNS: &str =
    "id, name, email, message, status, reply, replied_by, replied_at, notes, created_at";

#[async_trait]
impl MessageRepository for SqlxMessageRepository {
    async fn create(&self, input: &NewContactMessage) -> Result<ContactMessage> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO contact_messages (name, email, message, status, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.message)
        .bind(MessageStatus::New.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create contact message")?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Message not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactMessage>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contact_messages WHERE id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get contact message")?;

        row.map(|r| row_to_message(&r)).transpose()
    }

    async fn list(&self) -> Result<Vec<ContactMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contact_messages ORDER BY created_at DESC, id DESC",
            MESSAGE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list contact messages")?;

        rows.iter().map(row_to_message).collect()
    }

    async fn update(&self, message: &ContactMessage) -> Result<ContactMessage> {
        sqlx::query(
            "UPDATE contact_messages \
             SET status = ?, reply = ?, replied_by = ?, replied_at = ?, notes = ? \
             WHERE id = ?",
        )
        .bind(message.status.to_string())
        .bind(&message.reply)
        .bind(message.replied_by)
        .bind(message.replied_at)
        .bind(&message.notes)
        .bind(message.id)
        .execute(&self.pool)
        .await
        .context("Failed to update contact message")?;

        self.get_by_id(message.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Message not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM contact_messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete contact message")?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM contact_messages")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count contact messages")?;
        Ok(row.get("count"))
    }

    async fn count_unresolved(&self) -> Result<i64> {
        let row =
            sqlx::query("SELECT COUNT(*) as count FROM contact_messages WHERE status != ?")
                .bind(MessageStatus::Resolved.to_string())
                .fetch_one(&self.pool)
                .await
                .context("Failed to count unresolved messages")?;
        Ok(row.get("count"))
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ContactMessage> {
    let status_str: String = row.get("status");
    let status = MessageStatus::from_str(&status_str)
        .with_context(|| format!("Invalid message status in database: {}", status_str))?;

    Ok(ContactMessage {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        message: row.get("message"),
        status,
        reply: row.get("reply"),
        replied_by: row.get("replied_by"),
        replied_at: row.get("replied_at"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
    })
}
