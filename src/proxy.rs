//! Completion proxy
//!
//! Forwards a conversation history to the completion provider and relays the
//! provider's output as [`StreamChunk`]s while it is still being produced.
//! Every relay ends with exactly one terminal chunk, and the upstream stream
//! is released on every exit path, including the caller dropping the relay.

use crate::llm::{
    ChatMessage, CompletionParams, CompletionProvider, LlmError, ProviderEvent, ProviderStream,
};
use crate::wire::{ErrorKind, StreamChunk};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Ordered chunks of one relayed completion
pub type ChunkStream = BoxStream<'static, StreamChunk>;

/// Failures detected before any stream exists
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// Result of a health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub configured: bool,
    pub model: String,
}

pub struct CompletionProxy {
    provider: Arc<dyn CompletionProvider>,
    params: CompletionParams,
    /// Maximum wait for each upstream event
    chunk_timeout: Option<Duration>,
}

impl CompletionProxy {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        params: CompletionParams,
        chunk_timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            params,
            chunk_timeout,
        }
    }

    /// Report whether a provider credential is present, without a provider call
    pub fn check_health(&self) -> Health {
        Health {
            configured: self.provider.is_configured(),
            model: self.provider.model_id().to_string(),
        }
    }

    /// Relay a completion for `history`
    ///
    /// Only an empty history is rejected up front; every later failure is
    /// delivered as a terminal `Error` chunk.
    pub async fn relay_completion(
        &self,
        history: &[ChatMessage],
    ) -> Result<ChunkStream, RelayError> {
        if history.is_empty() {
            return Err(RelayError::InvalidRequest(
                "messages must contain at least one entry".to_string(),
            ));
        }

        if !self.provider.is_configured() {
            tracing::warn!("Completion requested but no provider credential is configured");
            return Ok(single(StreamChunk::error(
                ErrorKind::Unconfigured,
                "OPENROUTER_API_KEY is not configured",
            )));
        }

        tracing::debug!(messages = history.len(), "Relaying completion");

        let upstream = match self.provider.stream(history, &self.params).await {
            Ok(upstream) => upstream,
            Err(e) => return Ok(single(error_chunk(&e))),
        };

        Ok(relay(upstream, self.chunk_timeout))
    }
}

fn single(chunk: StreamChunk) -> ChunkStream {
    stream::once(async move { chunk }).boxed()
}

fn error_chunk(e: &LlmError) -> StreamChunk {
    StreamChunk::error(e.kind.to_wire(), e.message.clone())
}

/// Relay state; holds the upstream until a terminal chunk has been produced
struct Relay {
    upstream: Option<ProviderStream>,
    chunk_timeout: Option<Duration>,
    deltas: usize,
}

impl Relay {
    /// Release the upstream connection
    fn finish(&mut self) {
        self.upstream = None;
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if self.upstream.is_some() {
            tracing::info!(
                deltas = self.deltas,
                "Client went away before completion; closing upstream"
            );
        }
    }
}

enum Next {
    Event(Option<Result<ProviderEvent, LlmError>>),
    TimedOut(Duration),
}

async fn next_event(upstream: &mut ProviderStream, limit: Option<Duration>) -> Next {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
            Ok(event) => Next::Event(event),
            Err(_) => Next::TimedOut(limit),
        },
        None => Next::Event(upstream.next().await),
    }
}

fn relay(upstream: ProviderStream, chunk_timeout: Option<Duration>) -> ChunkStream {
    let state = Relay {
        upstream: Some(upstream),
        chunk_timeout,
        deltas: 0,
    };

    stream::unfold(state, |mut state| async move {
        let upstream = state.upstream.as_mut()?;
        let next = next_event(upstream, state.chunk_timeout).await;

        let chunk = match next {
            Next::Event(Some(Ok(ProviderEvent::TextDelta(text)))) => {
                state.deltas += 1;
                return Some((StreamChunk::Delta { text }, state));
            }
            Next::Event(Some(Ok(ProviderEvent::Finished { .. }))) => StreamChunk::Done,
            Next::Event(Some(Err(e))) => error_chunk(&e),
            Next::Event(None) => StreamChunk::error(
                ErrorKind::UpstreamUnavailable,
                "Provider stream ended before completion",
            ),
            Next::TimedOut(limit) => {
                tracing::warn!(timeout = ?limit, "Provider stream stalled");
                StreamChunk::error(
                    ErrorKind::UpstreamUnavailable,
                    format!("No output from provider for {limit:?}"),
                )
            }
        };

        tracing::debug!(deltas = state.deltas, terminal = chunk.event_name(), "Relay finished");
        state.finish();
        Some((chunk, state))
    })
    .boxed()
}
