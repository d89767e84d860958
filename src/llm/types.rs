//! Common types for LLM interactions

use crate::wire::{Role, WireMessage};
use futures::stream::BoxStream;

/// Message in a completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<WireMessage> for ChatMessage {
    fn from(msg: WireMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content,
        }
    }
}

/// Generation parameters forwarded with every request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionParams {
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            system: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Provider-independent event in a completion stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    TextDelta(String),
    Finished { reason: Option<String> },
}

/// Stream of provider events; dropping it closes the upstream connection
pub type ProviderStream = BoxStream<'static, Result<ProviderEvent, super::LlmError>>;
