//! Admin dashboard API endpoints
//!
//! Handles HTTP requests for the back-office overview screens:
//! - GET /api/admin/stats - Aggregated dashboard counters (see
//!   `services::stats`)
//! - GET /api/admin/monitoring - Process and request-level health
//! - GET /api/admin/logs - Last 100 audit entries
//! - POST /api/admin/backup - Full-collection JSON export

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::process;
use sysinfo::{Pid, System};

use crate::api::middleware::{log_admin_action, ApiError, AppState, AuthenticatedUser};
use crate::models::ActivityLogEntry;
use crate::services::stats::DashboardStats;

/// Entries returned by the logs screen
const LOGS_LIMIT: i64 = 100;

/// Newest audit entries included in a backup
const BACKUP_LOGS_LIMIT: i64 = 1000;

/// Backup payload layout version
const BACKUP_FORMAT_VERSION: u32 = 1;

/// App version constant - update when releasing
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response for process and request monitoring
#[derive(Debug, Serialize)]
pub struct MonitoringResponse {
    /// App version
    pub version: String,
    /// Audit entries since UTC midnight
    pub api_calls_today: i64,
    /// Total requests processed since start
    pub total_requests: u64,
    /// Average response time in milliseconds
    pub avg_response_time_ms: f64,
    /// Fraction of requests with a 4xx/5xx status
    pub error_rate: f64,
    /// Request count per "METHOD /path"
    pub endpoint_counts: BTreeMap<String, u64>,
    /// Process memory usage in bytes
    pub memory_bytes: u64,
    /// Process memory usage formatted (e.g., "45.2 MB")
    pub memory_formatted: String,
    /// System total memory in bytes
    pub system_total_memory: u64,
    /// System used memory in bytes
    pub system_used_memory: u64,
    /// Operating system name
    pub os_name: String,
    /// Process uptime in seconds
    pub uptime_seconds: u64,
    /// Uptime formatted (e.g., "2h 15m")
    pub uptime_formatted: String,
}

/// Build the admin dashboard router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/monitoring", get(get_monitoring))
        .route("/logs", get(get_logs))
        .route("/backup", post(create_backup))
}

/// GET /api/admin/stats - Aggregated dashboard counters
async fn get_stats(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state
        .stats_service
        .dashboard()
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(stats))
}

/// GET /api/admin/monitoring - Process and request-level health
async fn get_monitoring(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<MonitoringResponse>, ApiError> {
    let api_calls_today = state
        .stats_service
        .api_calls_today()
        .await
        .map_err(ApiError::internal)?;

    let mut sys = System::new_all();
    sys.refresh_all();

    let pid = Pid::from_u32(process::id());
    let memory_bytes = sys.process(pid).map(|p| p.memory()).unwrap_or(0);

    let uptime_seconds = state.request_stats.uptime_seconds();

    Ok(Json(MonitoringResponse {
        version: APP_VERSION.to_string(),
        api_calls_today,
        total_requests: state.request_stats.total_requests(),
        avg_response_time_ms: state.request_stats.avg_response_time_us() / 1000.0,
        error_rate: state.request_stats.error_rate(),
        endpoint_counts: state.request_stats.endpoint_counts(),
        memory_bytes,
        memory_formatted: format_bytes(memory_bytes),
        system_total_memory: sys.total_memory(),
        system_used_memory: sys.used_memory(),
        os_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
        uptime_seconds,
        uptime_formatted: format_uptime(uptime_seconds),
    }))
}

/// GET /api/admin/logs - Last 100 audit entries, newest first
async fn get_logs(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ActivityLogEntry>>, ApiError> {
    let entries = state
        .activity_repo
        .recent(LOGS_LIMIT)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(entries))
}

/// POST /api/admin/backup - Full-collection JSON export
///
/// Users serialize without their password hashes; audit logs are capped
/// at the newest 1000 entries.
async fn create_backup(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let users = state.user_service.list_users().await?;
    let messages = state
        .message_repo
        .list()
        .await
        .map_err(ApiError::internal)?;
    let notifications = state
        .notification_repo
        .list_all()
        .await
        .map_err(ApiError::internal)?;
    let featured_cities = state
        .featured_repo
        .list()
        .await
        .map_err(ApiError::internal)?;
    let settings = state.settings_service.get_system_settings().await?;
    let activity_logs = state
        .activity_repo
        .recent_raw(BACKUP_LOGS_LIMIT)
        .await
        .map_err(ApiError::internal)?;

    log_admin_action(&state, &actor, "Created a full backup export", &headers).await;

    Ok(Json(json!({
        "format_version": BACKUP_FORMAT_VERSION,
        "exported_at": Utc::now(),
        "users": users,
        "contact_messages": messages,
        "notifications": notifications,
        "featured_cities": featured_cities,
        "settings": settings,
        "activity_logs": activity_logs,
    })))
}

/// Format uptime to human readable string
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

/// Format bytes to human readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(60), "1m");
        assert_eq!(format_uptime(3700), "1h 1m");
        assert_eq!(format_uptime(90061), "1d 1h 1m");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
