//! Effects produced by state transitions

use super::state::Snapshot;
use crate::wire::WireMessage;

/// Effects to be executed after a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue a streaming request carrying the full history
    OpenStream {
        generation: u64,
        messages: Vec<WireMessage>,
    },

    /// Stop delivering chunks for `generation` and close its connection
    AbortStream { generation: u64 },

    /// Query the proxy's health endpoint
    CheckHealth,

    /// Publish the conversation to observers
    Notify(Snapshot),
}
