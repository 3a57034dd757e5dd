//! System settings service
//!
//! Typed access to the global key/value settings store. Settings are read
//! fresh on every request (no in-process caching) so an admin toggle takes
//! effect immediately, including the registration gate.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::{SettingsRepository, SqlxSettingsRepository};

/// Known setting keys
pub mod keys {
    pub const REGISTRATION_ENABLED: &str = "registration_enabled";
    pub const MAINTENANCE_MODE: &str = "maintenance_mode";
    pub const ANNOUNCEMENT: &str = "announcement";
}

/// The full set of global settings, with defaults filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    pub registration_enabled: bool,
    pub maintenance_mode: bool,
    pub announcement: String,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            registration_enabled: true,
            maintenance_mode: false,
            announcement: String::new(),
        }
    }
}

/// Admin update for system settings (named fields only; absent fields are
/// left unchanged)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub registration_enabled: Option<bool>,
    pub maintenance_mode: Option<bool>,
    pub announcement: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.registration_enabled.is_none()
            && self.maintenance_mode.is_none()
            && self.announcement.is_none()
    }
}

/// Settings service errors
#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    #[error("Failed to save settings: {0}")]
    SaveError(String),
}

/// Settings service over the settings repository
pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    /// Create a new settings service
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Create from SQLx repository
    pub fn from_sqlx(repo: SqlxSettingsRepository) -> Self {
        Self::new(Arc::new(repo))
    }

    /// Get all system settings, filling defaults for missing keys
    pub async fn get_system_settings(&self) -> Result<SystemSettings, SettingsServiceError> {
        let stored = self
            .repo
            .get_many(&[
                keys::REGISTRATION_ENABLED,
                keys::MAINTENANCE_MODE,
                keys::ANNOUNCEMENT,
            ])
            .await
            .map_err(|e| SettingsServiceError::LoadError(e.to_string()))?;

        let defaults = SystemSettings::default();

        Ok(SystemSettings {
            registration_enabled: stored
                .get(keys::REGISTRATION_ENABLED)
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.registration_enabled),
            maintenance_mode: stored
                .get(keys::MAINTENANCE_MODE)
                .and_then(|v| v.as_bool())
                .unwrap_or(defaults.maintenance_mode),
            announcement: stored
                .get(keys::ANNOUNCEMENT)
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or(defaults.announcement),
        })
    }

    /// Whether new registrations are currently accepted
    pub async fn registration_enabled(&self) -> Result<bool, SettingsServiceError> {
        Ok(self.get_system_settings().await?.registration_enabled)
    }

    /// Apply a partial update, upserting only the provided fields.
    ///
    /// Returns the settings as they stand after the update.
    pub async fn update(
        &self,
        patch: &SettingsPatch,
    ) -> Result<SystemSettings, SettingsServiceError> {
        if let Some(enabled) = patch.registration_enabled {
            self.repo
                .set(keys::REGISTRATION_ENABLED, &serde_json::json!(enabled))
                .await
                .map_err(|e| SettingsServiceError::SaveError(e.to_string()))?;
        }
        if let Some(maintenance) = patch.maintenance_mode {
            self.repo
                .set(keys::MAINTENANCE_MODE, &serde_json::json!(maintenance))
                .await
                .map_err(|e| SettingsServiceError::SaveError(e.to_string()))?;
        }
        if let Some(ref announcement) = patch.announcement {
            self.repo
                .set(keys::ANNOUNCEMENT, &serde_json::json!(announcement))
                .await
                .map_err(|e| SettingsServiceError::SaveError(e.to_string()))?;
        }

        self.get_system_settings().await
    }
}
