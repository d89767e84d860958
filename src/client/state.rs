//! Conversation state types

use crate::wire::{ErrorKind, Role, WireMessage};
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// Whether a message can still change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Assistant turn still receiving chunks
    Streaming,
    /// Frozen
    Complete,
    /// Frozen after a failed turn; content holds whatever arrived
    Failed,
}

/// One entry in the conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            status: MessageStatus::Complete,
        }
    }

    pub fn assistant_in_progress() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: String::new(),
            status: MessageStatus::Streaming,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: Some(self.id.clone()),
            role: self.role,
            content: self.content.clone(),
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Request lifecycle of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lifecycle {
    /// Ready for user input, nothing in flight
    #[default]
    Idle,

    /// Request issued, stream not yet open
    Submitting { generation: u64 },

    /// Chunks are being applied to the last message
    Streaming { generation: u64 },

    /// Terminal `done` applied; only ever observed in a snapshot, the
    /// conversation moves on to `Idle` in the same transition
    Settled { generation: u64 },

    /// Last turn failed; a new submit starts over
    Errored { kind: ErrorKind, message: String },
}

impl Lifecycle {
    /// Generation of the outstanding request, if any
    pub fn in_flight_generation(&self) -> Option<u64> {
        match self {
            Lifecycle::Submitting { generation } | Lifecycle::Streaming { generation } => {
                Some(*generation)
            }
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight_generation().is_some()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Submitting { .. } => "submitting",
            Lifecycle::Streaming { .. } => "streaming",
            Lifecycle::Settled { .. } => "settled",
            Lifecycle::Errored { .. } => "errored",
        }
    }
}

/// Whether the completion service can take requests, as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Checking,
    Online,
    Offline,
}

// ============================================================================
// Conversation
// ============================================================================

/// Everything an observer needs to render the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub lifecycle: Lifecycle,
    pub availability: Availability,
    pub input: String,
}

impl Snapshot {
    /// The most recent assistant message, if any
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

/// Single in-memory conversation
///
/// Mutated only through [`super::transition`]. At most one message is in
/// progress, and when one is, it is the last message.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub(super) messages: Vec<Message>,
    pub(super) lifecycle: Lifecycle,
    pub(super) input: String,
    pub(super) availability: Availability,
    /// Last generation handed out; generations start at 1
    pub(super) generation: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            messages: self.messages.clone(),
            lifecycle: self.lifecycle.clone(),
            availability: self.availability,
            input: self.input.clone(),
        }
    }

    /// History sent with the next request; failed turns stay local
    pub(super) fn request_history(&self) -> Vec<WireMessage> {
        self.messages
            .iter()
            .filter(|m| m.status == MessageStatus::Complete)
            .map(Message::to_wire)
            .collect()
    }

    pub(super) fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// The in-progress assistant message, which is always last
    pub(super) fn in_progress_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut().filter(|m| m.is_in_progress())
    }
}
