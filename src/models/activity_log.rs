//! Activity log model
//!
//! Append-only audit records: who did what, from where, and when.
//! Entries are never updated or deleted by normal flows.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Well-known action categories
pub mod actions {
    pub const LOGIN: &str = "LOGIN";
    pub const ADMIN_ACTION: &str = "ADMIN_ACTION";
}

/// A single audit record as stored
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLog {
    pub id: i64,
    /// Acting user; None for system actions or deleted accounts
    pub user_id: Option<i64>,
    /// Action category (see [`actions`])
    pub action: String,
    /// Human-readable detail
    pub details: String,
    /// Origin address
    pub ip: String,
    pub created_at: DateTime<Utc>,
}

/// An audit record joined with its actor's name/email for display
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLogEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub action: String,
    pub details: String,
    pub ip: String,
    pub created_at: DateTime<Utc>,
}
