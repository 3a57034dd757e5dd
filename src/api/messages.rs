//! Contact message API endpoints
//!
//! Public intake and admin triage:
//! - POST /api/contact - Store a contact-form submission (public)
//! - GET /api/admin/messages - List all messages, newest first
//! - PUT /api/admin/messages - Triage update (status, reply, notes)
//! - DELETE /api/admin/messages?id= - Remove a message
//!
//! A reply stamps the replying admin and timestamp; unless the patch
//! also sets a status explicitly, replying moves the status to
//! `replied`.

use axum::{
    extract::{Extension, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::api::middleware::{log_admin_action, ApiError, AppState, AuthenticatedUser};
use crate::models::{ContactMessage, MessagePatch, MessageStatus, NewContactMessage};

/// Query parameters for message deletion
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<i64>,
}

/// Request body for the triage update
#[derive(Debug, Deserialize)]
pub struct TriageRequest {
    pub id: i64,
    #[serde(flatten)]
    pub patch: MessagePatch,
}

/// Build the public contact router
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(submit_message))
}

/// Build the admin messages router
pub fn admin_router() -> Router<AppState> {
    Router::new().route("/", get(list_messages).put(triage_message).delete(delete_message))
}

/// POST /api/contact - Store a contact-form submission
async fn submit_message(
    State(state): State<AppState>,
    Json(body): Json<NewContactMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.name.trim();
    let email = body.email.trim();
    let message = body.message.trim();

    if name.is_empty() || email.is_empty() || message.is_empty() {
        return Err(ApiError::bad_request(
            "Name, email and message are required",
        ));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    let stored = state
        .message_repo
        .create(&NewContactMessage {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        })
        .await
        .map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Thanks for reaching out. We'll get back to you.",
            "id": stored.id,
        })),
    ))
}

/// GET /api/admin/messages - List all messages, newest first
async fn list_messages(
    State(state): State<AppState>,
    _user: Extension<AuthenticatedUser>,
) -> Result<Json<Vec<ContactMessage>>, ApiError> {
    let messages = state.message_repo.list().await.map_err(ApiError::internal)?;
    Ok(Json(messages))
}

/// PUT /api/admin/messages - Triage a message
async fn triage_message(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(body): Json<TriageRequest>,
) -> Result<Json<ContactMessage>, ApiError> {
    let mut message = state
        .message_repo
        .get_by_id(body.id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;

    if let Some(reply) = body.patch.reply {
        message.reply = Some(reply);
        message.replied_by = Some(actor.id);
        message.replied_at = Some(Utc::now());
        if body.patch.status.is_none() {
            message.status = MessageStatus::Replied;
        }
    }
    if let Some(status) = body.patch.status {
        message.status = status;
    }
    if let Some(notes) = body.patch.notes {
        message.notes = Some(notes);
    }

    let updated = state
        .message_repo
        .update(&message)
        .await
        .map_err(ApiError::internal)?;

    log_admin_action(
        &state,
        &actor,
        &format!("Updated contact message #{} ({})", updated.id, updated.status),
        &headers,
    )
    .await;

    Ok(Json(updated))
}

/// DELETE /api/admin/messages?id= - Remove a message
async fn delete_message(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(actor)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::bad_request("Message id is required"))?;

    let deleted = state
        .message_repo
        .delete(id)
        .await
        .map_err(ApiError::internal)?;
    if !deleted {
        return Err(ApiError::not_found("Message not found"));
    }

    log_admin_action(
        &state,
        &actor,
        &format!("Deleted contact message #{}", id),
        &headers,
    )
    .await;

    Ok(Json(json!({ "message": "Message deleted" })))
}
