//! HTTP request handlers

use super::sse::sse_stream;
use super::AppState;
use crate::llm::ChatMessage;
use crate::proxy::RelayError;
use crate::wire::{ChatRequest, ErrorKind, ErrorResponse, HealthResponse, CHAT_PATH};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(CHAT_PATH, get(health).post(relay_chat))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Completion relay
// ============================================================

async fn relay_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    tracing::info!(messages = request.messages.len(), "Chat request received");

    let history: Vec<ChatMessage> = request
        .messages
        .into_iter()
        .map(ChatMessage::from)
        .collect();

    let chunks = state.proxy.relay_completion(&history).await?;
    Ok(sse_stream(chunks).into_response())
}

// ============================================================
// Health
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.proxy.check_health();
    tracing::debug!(configured = health.configured, "Health check");

    Json(HealthResponse {
        status: "healthy".to_string(),
        api_key_configured: health.configured,
        model: health.model,
        timestamp: chrono::Utc::now(),
    })
}

async fn get_version() -> &'static str {
    concat!("chat-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    InvalidRequest(String),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::InvalidRequest(msg) => AppError::InvalidRequest(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorKind::InvalidRequest, msg)
            }
        };

        tracing::warn!(status = %status, kind = %kind, error = %message, "Rejecting chat request");
        (status, Json(ErrorResponse::new(kind, message))).into_response()
    }
}
