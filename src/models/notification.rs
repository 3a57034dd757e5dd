//! Notification model
//!
//! Banner notifications shown to users, filtered by audience and expiry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A banner notification
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub audience: Audience,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification severity/type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Warning,
    Success,
    Error,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::Info => write!(f, "info"),
            NotificationType::Warning => write!(f, "warning"),
            NotificationType::Success => write!(f, "success"),
            NotificationType::Error => write!(f, "error"),
        }
    }
}

impl FromStr for NotificationType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(NotificationType::Info),
            "warning" => Ok(NotificationType::Warning),
            "success" => Ok(NotificationType::Success),
            "error" => Ok(NotificationType::Error),
            _ => Err(anyhow::anyhow!("Invalid notification type: {}", s)),
        }
    }
}

/// Who a notification is shown to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    All,
    Admins,
    Users,
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::All => write!(f, "all"),
            Audience::Admins => write!(f, "admins"),
            Audience::Users => write!(f, "users"),
        }
    }
}

impl FromStr for Audience {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Audience::All),
            "admins" => Ok(Audience::Admins),
            "users" => Ok(Audience::Users),
            _ => Err(anyhow::anyhow!("Invalid audience: {}", s)),
        }
    }
}

/// Input for creating a notification
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
    #[serde(default)]
    pub audience: Audience,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Admin update (named fields only)
///
/// `expires_at` distinguishes "absent" (leave unchanged) from an explicit
/// `null` (clear the expiry).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
    pub audience: Option<Audience>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Maps a present-but-null JSON field to `Some(None)`; a missing field stays
/// `None` via `#[serde(default)]`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<DateTime<Utc>>::deserialize(deserializer).map(Some)
}
