//! Route handler functions for the HTTP endpoints.
//!
//! Each handler extracts the authenticated user and request parameters,
//! calls into the dispatcher, and wraps the result in the JSON envelope.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mindvolta_chat::dispatcher::check_receiver;
use mindvolta_chat::{Channel, MessageView};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// Body for POST /api/chat/message.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub receiver_id: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

/// Success envelope shared by every chat endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryData {
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageData {
    pub user_message: MessageView,
    pub agent_message: MessageView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health - liveness check, no auth.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.registry.session_count(),
    })
}

/// GET /api/chat/history - most recent messages, oldest first.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiResponse<HistoryData>>, ApiError> {
    let messages = state
        .dispatcher
        .history(user.id(), params.limit)
        .await?
        .iter()
        .map(|m| MessageView::for_viewer(m, user.id()))
        .collect();

    Ok(ApiResponse::ok(HistoryData { messages }))
}

/// POST /api/chat/message - pull channel: returns both sides of the exchange.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SendMessageData>>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    check_receiver(req.receiver_id.as_deref())?;

    let exchange = state
        .dispatcher
        .handle(user.id(), &req.message, Channel::Pull)
        .await?;

    Ok(ApiResponse::ok(SendMessageData {
        user_message: MessageView::for_viewer(&exchange.user_message, user.id()),
        agent_message: MessageView::for_viewer(&exchange.agent_message, user.id()),
    }))
}
