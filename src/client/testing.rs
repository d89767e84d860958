//! Scripted transport for tests

use super::transport::{ChatTransport, ChunkStream, TransportError};
use crate::wire::{ErrorKind, HealthResponse, StreamChunk, WireMessage};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type Item = Result<StreamChunk, TransportError>;

/// What the transport does for one `open` call
pub enum OpenScript {
    /// Stream whatever the paired [`ChunkFeed`] sends
    Feed(mpsc::UnboundedReceiver<Item>),
    /// Reject the request
    Fail(TransportError),
}

/// Test-side end of a scripted response
pub struct ChunkFeed {
    tx: mpsc::UnboundedSender<Item>,
}

/// A scripted response and the feed that drives it
pub fn feed() -> (OpenScript, ChunkFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OpenScript::Feed(rx), ChunkFeed { tx })
}

impl ChunkFeed {
    pub fn delta(&self, text: &str) {
        let _ = self.tx.send(Ok(StreamChunk::delta(text)));
    }

    pub fn done(&self) {
        let _ = self.tx.send(Ok(StreamChunk::Done));
    }

    pub fn error(&self, kind: ErrorKind, message: &str) {
        let _ = self.tx.send(Ok(StreamChunk::error(kind, message)));
    }

    /// End the response without a terminal chunk
    pub fn end(self) {}

    /// Resolves once the client has dropped the response
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

pub struct ScriptedTransport {
    configured: bool,
    scripts: Mutex<VecDeque<OpenScript>>,
    requests: Mutex<Vec<Vec<WireMessage>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            configured: true,
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Health checks report a missing provider credential
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn push(&self, script: OpenScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_failure(&self, error: TransportError) {
        self.push(OpenScript::Fail(error));
    }

    /// Histories sent so far, one per `open`
    pub fn requests(&self) -> Vec<Vec<WireMessage>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn open_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open(&self, messages: &[WireMessage]) -> Result<ChunkStream, TransportError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        match self.scripts.lock().unwrap().pop_front() {
            Some(OpenScript::Feed(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(OpenScript::Fail(e)) => Err(e),
            None => Err(TransportError::unavailable("no scripted response")),
        }
    }

    async fn check_health(&self) -> Result<HealthResponse, TransportError> {
        Ok(HealthResponse {
            status: "healthy".to_string(),
            api_key_configured: self.configured,
            model: "scripted".to_string(),
            timestamp: chrono::Utc::now(),
        })
    }
}
