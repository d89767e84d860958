//! Completion provider abstraction
//!
//! The proxy talks to the model through [`CompletionProvider`], constructed
//! once at startup and injected, so tests can substitute a scripted fake.

mod config;
mod error;
mod openai;
mod types;

#[cfg(test)]
pub mod testing;

pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{LlmError, LlmErrorKind};
pub use openai::OpenAiCompatProvider;
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for completion providers
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Whether a credential is present; never contacts the provider
    fn is_configured(&self) -> bool;

    /// Get the model ID
    fn model_id(&self) -> &str;

    /// Open a completion stream for `history`
    async fn stream(
        &self,
        history: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<ProviderStream, LlmError>;
}

/// Logging wrapper for completion providers
pub struct LoggingProvider {
    inner: Arc<dyn CompletionProvider>,
    model_id: String,
}

impl LoggingProvider {
    pub fn new(inner: Arc<dyn CompletionProvider>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl CompletionProvider for LoggingProvider {
    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn stream(
        &self,
        history: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<ProviderStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream(history, params).await;
        let duration = start.elapsed();

        match result {
            Ok(stream) => {
                tracing::info!(
                    model = %self.model_id,
                    messages = history.len(),
                    open_ms = %duration.as_millis(),
                    "Completion stream opened"
                );

                let model_id = self.model_id.clone();
                let mut delta_count = 0usize;
                Ok(stream
                    .inspect(move |event| match event {
                        Ok(ProviderEvent::TextDelta(_)) => delta_count += 1,
                        Ok(ProviderEvent::Finished { reason }) => {
                            tracing::info!(
                                model = %model_id,
                                deltas = delta_count,
                                total_ms = %start.elapsed().as_millis(),
                                reason = ?reason,
                                "Completion stream finished"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                model = %model_id,
                                deltas = delta_count,
                                error = %e.message,
                                transient = e.kind.is_transient(),
                                "Completion stream failed"
                            );
                        }
                    })
                    .boxed())
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    open_ms = %duration.as_millis(),
                    error = %e.message,
                    transient = e.kind.is_transient(),
                    "Completion request failed"
                );
                Err(e)
            }
        }
    }
}
