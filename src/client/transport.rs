//! HTTP transport to the completion proxy

use crate::wire::{
    ChatRequest, ErrorKind, ErrorResponse, HealthResponse, SseDecoder, StreamChunk, WireMessage,
    CHAT_PATH,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, StatusCode};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Chunks of one response as the client receives them
pub type ChunkStream = BoxStream<'static, Result<StreamChunk, TransportError>>;

/// Failure talking to the proxy, classified with the wire taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }
}

/// Connection to a completion proxy
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue a streaming request; dropping the returned stream closes it
    async fn open(&self, messages: &[WireMessage]) -> Result<ChunkStream, TransportError>;

    /// Query the proxy's health endpoint
    async fn check_health(&self) -> Result<HealthResponse, TransportError>;
}

/// [`ChatTransport`] over HTTP with SSE-framed responses
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                TransportError::unavailable(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}{CHAT_PATH}", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, messages: &[WireMessage]) -> Result<ChunkStream, TransportError> {
        let request = ChatRequest {
            messages: messages.to_vec(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| TransportError::unavailable(format!("Cannot reach chat server: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status, &body));
        }

        Ok(decode_chunks(response.bytes_stream()))
    }

    async fn check_health(&self) -> Result<HealthResponse, TransportError> {
        let response = self
            .client
            .get(&self.endpoint)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| TransportError::unavailable(format!("Cannot reach chat server: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::unavailable(format!(
                "Health check failed with HTTP {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::unavailable(format!("Malformed health response: {e}")))
    }
}

/// Classify a non-2xx answer to a chat request
fn rejection(status: StatusCode, body: &str) -> TransportError {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return TransportError::new(err.kind, err.message);
    }

    let kind = if status == StatusCode::BAD_REQUEST {
        ErrorKind::InvalidRequest
    } else {
        ErrorKind::UpstreamUnavailable
    };
    TransportError::new(kind, format!("Chat server answered HTTP {status}"))
}

/// Decode an SSE body into chunks, stopping after the first terminal item
pub(crate) fn decode_chunks<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = ChunkReader {
        body: Some(body.boxed()),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(item) = reader.pending.pop_front() {
                return Some((item, reader));
            }
            let next = match reader.body.as_mut() {
                Some(body) => body.next().await,
                None => return None,
            };

            match next {
                Some(Ok(bytes)) => {
                    for frame in reader.decoder.push(bytes.as_ref()) {
                        reader.accept(&frame.data);
                    }
                }
                Some(Err(e)) => {
                    reader.stop(Err(TransportError::unavailable(format!(
                        "Connection lost mid-response: {e}"
                    ))));
                }
                None => {
                    if let Some(frame) = reader.decoder.finish() {
                        reader.accept(&frame.data);
                    }
                    reader.body = None;
                }
            }
        }
    })
    .boxed()
}

struct ChunkReader<B, E> {
    /// Dropped once a terminal item is queued, closing the connection
    body: Option<BoxStream<'static, Result<B, E>>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<StreamChunk, TransportError>>,
}

impl<B, E> ChunkReader<B, E> {
    fn stop(&mut self, item: Result<StreamChunk, TransportError>) {
        if self.body.take().is_some() {
            self.pending.push_back(item);
        }
    }

    fn accept(&mut self, data: &str) {
        if self.body.is_none() {
            return;
        }
        match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) if chunk.is_terminal() => self.stop(Ok(chunk)),
            Ok(chunk) => self.pending.push_back(Ok(chunk)),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed chunk from chat server");
                self.stop(Err(TransportError::unavailable(format!(
                    "Malformed chunk from chat server: {e}"
                ))));
            }
        }
    }
}
