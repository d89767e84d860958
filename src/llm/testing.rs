//! Scripted provider for tests

use super::{
    ChatMessage, CompletionParams, CompletionProvider, LlmError, ProviderEvent, ProviderStream,
};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

/// What the mock does for one `stream` call
#[derive(Debug, Clone)]
pub enum Script {
    /// Yield these items and end
    Events(Vec<Result<ProviderEvent, LlmError>>),
    /// Yield these items, then never produce another one
    Stall(Vec<Result<ProviderEvent, LlmError>>),
    /// Fail before any stream exists
    OpenError(LlmError),
}

impl Script {
    /// Text deltas followed by a finish marker
    pub fn text(deltas: &[&str]) -> Self {
        let mut events: Vec<_> = deltas
            .iter()
            .map(|d| Ok(ProviderEvent::TextDelta((*d).to_string())))
            .collect();
        events.push(Ok(ProviderEvent::Finished {
            reason: Some("stop".to_string()),
        }));
        Script::Events(events)
    }
}

/// Mock provider that replays one [`Script`] per call
pub struct MockProvider {
    configured: bool,
    scripts: Mutex<VecDeque<Script>>,
    calls: AtomicUsize,
    histories: Mutex<Vec<Vec<ChatMessage>>>,
    /// Set once the most recent stream handed out has been dropped
    stream_dropped: Arc<AtomicBool>,
}

impl MockProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            configured: true,
            scripts: Mutex::new(scripts.into()),
            calls: AtomicUsize::new(0),
            histories: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn histories(&self) -> Vec<Vec<ChatMessage>> {
        self.histories.lock().unwrap().clone()
    }

    pub fn stream_dropped(&self) -> bool {
        self.stream_dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn stream(
        &self,
        history: &[ChatMessage],
        _params: &CompletionParams,
    ) -> Result<ProviderStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.histories.lock().unwrap().push(history.to_vec());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Script::Events(vec![]));

        let inner = match script {
            Script::OpenError(e) => return Err(e),
            Script::Events(events) => stream::iter(events).boxed(),
            Script::Stall(events) => stream::iter(events).chain(stream::pending()).boxed(),
        };

        self.stream_dropped.store(false, Ordering::SeqCst);
        Ok(DropFlagStream {
            inner,
            dropped: self.stream_dropped.clone(),
        }
        .boxed())
    }
}

/// Records when the upstream side of a relay is released
struct DropFlagStream {
    inner: ProviderStream,
    dropped: Arc<AtomicBool>,
}

impl Stream for DropFlagStream {
    type Item = Result<ProviderEvent, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for DropFlagStream {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}
