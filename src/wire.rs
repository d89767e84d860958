//! Transport contract shared by the proxy and the client
//!
//! One HTTP request per turn. The request body is a [`ChatRequest`]; the
//! response body is a Server-Sent Events stream in which every event carries
//! one [`StreamChunk`] as JSON. Any non-2xx response carries an
//! [`ErrorResponse`].

pub mod sse;

pub use sse::{SseDecoder, SseFrame};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path of the chat endpoint (POST to stream, GET for health)
pub const CHAT_PATH: &str = "/api/chat";

/// Failure taxonomy visible to both sides of the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed request, never retried
    InvalidRequest,
    /// No provider credential configured
    Unconfigured,
    /// Transient network or provider failure
    UpstreamUnavailable,
    /// Provider answered but reported a failed generation
    GenerationFailed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Unconfigured => "unconfigured",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::GenerationFailed => "generation_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of incremental output for a single request
///
/// The chunks of one request form a finite ordered sequence that ends with
/// exactly one terminal chunk (`Done` or `Error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    Delta { text: String },
    Done,
    Error { kind: ErrorKind, message: String },
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamChunk::Delta { text: text.into() }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        StreamChunk::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamChunk::Done | StreamChunk::Error { .. })
    }

    /// SSE event name used when framing this chunk
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamChunk::Delta { .. } => "delta",
            StreamChunk::Done => "done",
            StreamChunk::Error { .. } => "error",
        }
    }
}

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
}

/// Body of `GET /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub api_key_configured: bool,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

/// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: "API request failed".to_string(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
