//! Pure state transition function
//!
//! Given the same conversation and event, [`transition`] always produces the
//! same successor and effects; all I/O happens in the runtime.

use super::state::{Availability, Conversation, Lifecycle, Message, MessageStatus};
use super::{Effect, Event};
use crate::wire::{ErrorKind, StreamChunk};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Conversation,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Conversation) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Append a snapshot of the current `new_state`
    fn notify(self) -> Self {
        let snapshot = self.new_state.snapshot();
        self.with_effect(Effect::Notify(snapshot))
    }
}

/// Events rejected without changing the conversation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("A response is still in progress (cancel it first)")]
    Busy,
    #[error("Conversation can only be cleared when idle")]
    NotIdle,
    #[error("Completion service is not configured; submission is disabled")]
    Offline,
}

pub fn transition(state: &Conversation, event: Event) -> Result<TransitionResult, TransitionError> {
    let mut next = state.clone();

    match (&state.lifecycle, event) {
        // ============================================================
        // Input
        // ============================================================
        (_, Event::InputChanged { text }) => {
            next.input = text;
            Ok(TransitionResult::new(next).notify())
        }

        // ============================================================
        // Submission
        // ============================================================
        // Rejections leave the input buffer as it was
        (Lifecycle::Submitting { .. } | Lifecycle::Streaming { .. }, Event::Submit { .. }) => {
            Err(TransitionError::Busy)
        }

        (_, Event::Submit { text }) => {
            let text = text.as_deref().unwrap_or(&state.input).trim();
            if text.is_empty() {
                return Ok(TransitionResult::new(next));
            }
            if state.availability == Availability::Offline {
                return Err(TransitionError::Offline);
            }

            let text = text.to_string();
            next.input.clear();
            next.messages.push(Message::user(text));
            let generation = next.next_generation();
            next.lifecycle = Lifecycle::Submitting { generation };
            let messages = next.request_history();

            Ok(TransitionResult::new(next)
                .with_effect(Effect::OpenStream {
                    generation,
                    messages,
                })
                .notify())
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (
            Lifecycle::Submitting { generation } | Lifecycle::Streaming { generation },
            Event::Cancel,
        ) => {
            let generation = *generation;
            if next.in_progress_mut().is_some() {
                next.messages.pop();
            }
            next.lifecycle = Lifecycle::Idle;

            Ok(TransitionResult::new(next)
                .with_effect(Effect::AbortStream { generation })
                .notify())
        }

        // Nothing in flight; cancelling twice is harmless
        (_, Event::Cancel) => Ok(TransitionResult::new(next)),

        // ============================================================
        // Clearing
        // ============================================================
        (Lifecycle::Idle | Lifecycle::Settled { .. }, Event::Clear) => {
            next.messages.clear();
            next.lifecycle = Lifecycle::Idle;
            Ok(TransitionResult::new(next).notify())
        }

        (Lifecycle::Submitting { .. } | Lifecycle::Streaming { .. }, Event::Clear) => {
            Err(TransitionError::Busy)
        }

        (Lifecycle::Errored { .. }, Event::Clear) => Err(TransitionError::NotIdle),

        // ============================================================
        // Health
        // ============================================================
        (_, Event::RefreshHealth) => {
            next.availability = Availability::Checking;
            Ok(TransitionResult::new(next)
                .with_effect(Effect::CheckHealth)
                .notify())
        }

        (_, Event::HealthChecked { configured }) => {
            next.availability = if configured {
                Availability::Online
            } else {
                Availability::Offline
            };
            Ok(TransitionResult::new(next).notify())
        }

        // ============================================================
        // Stream Events
        // ============================================================

        // Anything tagged with a generation other than the one in flight
        // belongs to a cancelled or finished request
        (lifecycle, event)
            if event.generation().is_some()
                && event.generation() != lifecycle.in_flight_generation() =>
        {
            tracing::debug!(
                event = event.name(),
                generation = ?event.generation(),
                lifecycle = lifecycle.name(),
                "Ignoring stale stream event"
            );
            Ok(TransitionResult::new(next))
        }

        (Lifecycle::Submitting { generation }, Event::StreamOpened { .. }) => {
            begin_assistant(&mut next, *generation);
            Ok(TransitionResult::new(next).notify())
        }

        (Lifecycle::Streaming { .. }, Event::StreamOpened { .. }) => {
            Ok(TransitionResult::new(next))
        }

        (_, Event::Chunk { generation, chunk }) => match chunk {
            StreamChunk::Delta { text } => {
                begin_assistant(&mut next, generation);
                if let Some(message) = next.in_progress_mut() {
                    message.content.push_str(&text);
                }
                Ok(TransitionResult::new(next).notify())
            }
            StreamChunk::Done => {
                begin_assistant(&mut next, generation);
                if let Some(message) = next.in_progress_mut() {
                    message.status = MessageStatus::Complete;
                }
                next.lifecycle = Lifecycle::Settled { generation };
                next.availability = Availability::Online;
                let settled = TransitionResult::new(next).notify();

                let mut idle = settled.new_state.clone();
                idle.lifecycle = Lifecycle::Idle;
                Ok(TransitionResult {
                    new_state: idle,
                    effects: settled.effects,
                }
                .notify())
            }
            StreamChunk::Error { kind, message } => Ok(fail(next, kind, message)),
        },

        (_, Event::StreamFailed { kind, message, .. }) => Ok(fail(next, kind, message)),

        // Generation-tagged events only match above while a request is in
        // flight; this arm exists for exhaustiveness
        (_, Event::StreamOpened { .. }) => Ok(TransitionResult::new(next)),
    }
}

/// Create the assistant message on the first stream event
fn begin_assistant(conv: &mut Conversation, generation: u64) {
    if let Lifecycle::Submitting { .. } = conv.lifecycle {
        conv.messages.push(Message::assistant_in_progress());
        conv.lifecycle = Lifecycle::Streaming { generation };
    }
}

/// Freeze the in-progress message, if any, and record the failure
fn fail(mut conv: Conversation, kind: ErrorKind, message: String) -> TransitionResult {
    if let Some(partial) = conv.in_progress_mut() {
        partial.status = MessageStatus::Failed;
    }
    if kind == ErrorKind::Unconfigured {
        conv.availability = Availability::Offline;
    }
    conv.lifecycle = Lifecycle::Errored { kind, message };
    TransitionResult::new(conv).notify()
}
