//! Events that drive the conversation

use crate::wire::{ErrorKind, StreamChunk};

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    InputChanged { text: String },
    /// Submit `text`, or the input buffer when `None`
    Submit { text: Option<String> },
    Cancel,
    Clear,
    RefreshHealth,

    // Transport events
    HealthChecked { configured: bool },
    StreamOpened { generation: u64 },
    Chunk { generation: u64, chunk: StreamChunk },
    StreamFailed {
        generation: u64,
        kind: ErrorKind,
        message: String,
    },
}

impl Event {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::InputChanged { .. } => "input_changed",
            Event::Submit { .. } => "submit",
            Event::Cancel => "cancel",
            Event::Clear => "clear",
            Event::RefreshHealth => "refresh_health",
            Event::HealthChecked { .. } => "health_checked",
            Event::StreamOpened { .. } => "stream_opened",
            Event::Chunk { .. } => "chunk",
            Event::StreamFailed { .. } => "stream_failed",
        }
    }

    /// Generation tag of transport events
    pub fn generation(&self) -> Option<u64> {
        match self {
            Event::StreamOpened { generation }
            | Event::Chunk { generation, .. }
            | Event::StreamFailed { generation, .. } => Some(*generation),
            _ => None,
        }
    }
}
