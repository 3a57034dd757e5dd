//! Contact message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A message submitted through the public contact form
#[derive(Debug, Clone, Serialize)]
pub struct ContactMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_by: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Triage status of a contact message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    New,
    Read,
    Replied,
    Resolved,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::New => write!(f, "new"),
            MessageStatus::Read => write!(f, "read"),
            MessageStatus::Replied => write!(f, "replied"),
            MessageStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for MessageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(MessageStatus::New),
            "read" => Ok(MessageStatus::Read),
            "replied" => Ok(MessageStatus::Replied),
            "resolved" => Ok(MessageStatus::Resolved),
            _ => Err(anyhow::anyhow!("Invalid message status: {}", s)),
        }
    }
}

/// Input for creating a contact message
#[derive(Debug, Clone, Deserialize)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Admin triage update (named fields only)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePatch {
    pub status: Option<MessageStatus>,
    pub reply: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for s in ["new", "read", "replied", "resolved"] {
            let status = MessageStatus::from_str(s).unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!(MessageStatus::from_str("archived").is_err());
    }

    #[test]
    fn test_status_serde_wire_format() {
        assert_eq!(
            serde_json::to_string(&MessageStatus::Replied).unwrap(),
            "\"replied\""
        );
        let status: MessageStatus = serde_json::from_str("\"resolved\"").unwrap();
        assert_eq!(status, MessageStatus::Resolved);
    }
}
