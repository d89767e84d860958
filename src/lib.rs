//! Chat relay - streaming LLM chat
//!
//! A completion proxy that relays a provider's output as Server-Sent
//! Events, and a client-side conversation state machine that consumes them.

pub mod api;
pub mod client;
pub mod llm;
pub mod proxy;
pub mod system_prompt;
pub mod wire;
