//! Admin user-management API endpoints
//!
//! Handles HTTP requests for the back-office user screens:
//! - GET /api/admin/users - List every account
//! - PUT /api/admin/users - Ban/unban a user
//! - PATCH /api/admin/users - Change a user's role
//! - DELETE /api/admin/users?id= - Delete a user
//! - POST /api/admin/users/bulk - Bulk ban/unban/delete
//! - GET /api/admin/users/export - CSV dump
//!
//! All routes sit behind the admin gate. Self-targeting mutations are
//! rejected on the single-user endpoints and silently excluded in bulk;
//! bulk delete additionally never removes an admin account.

use axum::{
    extract::{Extension, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;

use crate::api::middleware::{client_ip, log_admin_action, ApiError, AppState, AuthenticatedUser};
use crate::models::{User, UserRole};
use crate::services::user::BulkAction;

/// Request body for the ban toggle
#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub id: i64,
    pub is_banned: bool,
}

/// Request body for the role change
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub id: i64,
    pub role: String,
}

/// Query parameters for single-user deletion
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<i64>,
}

/// Request body for bulk actions
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    #[serde(default)]
    pub user_ids: Vec<i64>,
    pub action: String,
}

/// Build the admin users router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_users)
                .put(set_banned)
                .patch(set_role)
                .delete(delete_user),
        )
        .route("/bulk", post(bulk_action))
        .route("/export", get(export_csv))
}

/// GET /api/admin/users - List every account, newest first
async fn list_users(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let users = state.user_service.list_users().await?;
    Ok(Json(json!({
        "total": users.len(),
        "users": users,
    })))
}

/// PUT /api/admin/users - Ban or unban a user
async fn set_banned(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<BanRequest>,
) -> Result<Json<User>, ApiError> {
    let updated = state
        .user_service
        .set_banned(&actor, body.id, body.is_banned, &client_ip(&headers))
        .await?;
    Ok(Json(updated))
}

/// PATCH /api/admin/users - Change a user's role
async fn set_role(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    let role = UserRole::from_str(&body.role)
        .map_err(|_| ApiError::bad_request(format!("Invalid role: {}", body.role)))?;

    let updated = state
        .user_service
        .set_role(&actor, body.id, role, &client_ip(&headers))
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/admin/users?id= - Delete a user
async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("User id is required"))?;

    state
        .user_service
        .delete_user(&actor, id, &client_ip(&headers))
        .await?;

    Ok(Json(json!({ "message": "User deleted" })))
}

/// POST /api/admin/users/bulk - Apply one action to many users
///
/// Responds with the count actually affected, which can be lower than
/// the number of ids submitted because of the exclusion rules.
async fn bulk_action(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<BulkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let action = BulkAction::from_str(&body.action)
        .map_err(|_| ApiError::bad_request(format!("Invalid bulk action: {}", body.action)))?;

    let affected = state
        .user_service
        .bulk(&actor, &body.user_ids, action, &client_ip(&headers))
        .await?;

    Ok(Json(json!({
        "message": format!("Bulk {} applied", action),
        "affected": affected,
    })))
}

/// GET /api/admin/users/export - CSV dump of every account
async fn export_csv(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.user_service.list_users().await?;
    let csv = users_to_csv(&users);

    log_admin_action(
        &state,
        &actor,
        &format!("Exported {} user(s) to CSV", users.len()),
        &headers,
    )
    .await;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"users.csv\"",
            ),
        ],
        csv,
    ))
}

/// Render users as CSV: Name, Email, Role, Status, Saved Cities,
/// Last Login, Created At
fn users_to_csv(users: &[User]) -> String {
    let mut out = String::from("Name,Email,Role,Status,Saved Cities,Last Login,Created At\n");
    for user in users {
        let status = if user.is_banned { "Banned" } else { "Active" };
        let last_login = user
            .last_login
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let row = [
            csv_field(&user.name),
            csv_field(&user.email),
            user.role.to_string(),
            status.to_string(),
            user.saved_cities.len().to_string(),
            last_login,
            user.created_at.to_rfc3339(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quote a CSV field when it contains a delimiter, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
