//! HTTP surface of the completion proxy
//!
//! `POST /api/chat` relays a completion as Server-Sent Events,
//! `GET /api/chat` reports provider health.

mod handlers;
mod sse;

pub use handlers::create_router;

use crate::proxy::CompletionProxy;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<CompletionProxy>,
}

impl AppState {
    pub fn new(proxy: CompletionProxy) -> Self {
        Self {
            proxy: Arc::new(proxy),
        }
    }
}
