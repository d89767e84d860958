//! Client-side conversation state machine
//!
//! Pure transitions over a single in-memory [`Conversation`], plus the
//! runtime that executes their effects against a [`ChatTransport`].

mod effect;
mod event;
pub mod runtime;
pub mod state;
mod transition;
pub mod transport;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub mod testing;

pub use effect::Effect;
pub use event::Event;
pub use runtime::{spawn_conversation, ConversationHandle, RuntimeClosed, Update};
pub use state::{Availability, Conversation, Lifecycle, Message, MessageStatus, Snapshot};
pub use transition::{transition, TransitionError, TransitionResult};
pub use transport::{ChatTransport, HttpTransport, TransportError};
