//! `OpenAI`-compatible streaming provider (`OpenRouter` by default)

use super::config::LlmConfig;
use super::types::{ChatMessage, CompletionParams, ProviderEvent, ProviderStream};
use super::{CompletionProvider, LlmError};
use crate::wire::{SseDecoder, SseFrame};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Streams chat completions from an `OpenAI`-compatible `/chat/completions` endpoint
pub struct OpenAiCompatProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl OpenAiCompatProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        // No overall timeout: a completion stream may legitimately run for minutes
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    fn translate_request(
        &self,
        history: &[ChatMessage],
        params: &CompletionParams,
    ) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);

        if let Some(system) = &params.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.extend(history.iter().map(|msg| OpenAiMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }));

        OpenAiRequest {
            model: self.model.clone(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        history: &[ChatMessage],
        params: &CompletionParams,
    ) -> Result<ProviderStream, LlmError> {
        let Some(api_key) = &self.api_key else {
            return Err(LlmError::unconfigured("OPENROUTER_API_KEY is not configured"));
        };

        let request = self.translate_request(history, params);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        Ok(translate_stream(response.bytes_stream()))
    }
}

/// Map a non-2xx provider answer onto an error class
fn classify_status(status: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<OpenAiErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |resp| resp.error.message);

    match status {
        401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
        429 => LlmError::rate_limit(format!("Rate limit exceeded: {message}")),
        400 => LlmError::invalid_request(format!("Invalid request: {message}")),
        500..=599 => LlmError::server_error(format!("Server error: {message}")),
        _ => LlmError::unknown(format!("HTTP {status}: {message}")),
    }
}

/// Turn a provider SSE body into provider events
///
/// The returned stream yields at most one terminal item (`Finished` or an
/// error) and then ends, dropping the body.
pub(crate) fn translate_stream<S, B, E>(body: S) -> ProviderStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let reader = FrameReader {
        body: body.boxed(),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        terminated: false,
        body_ended: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(item) = reader.pending.pop_front() {
                return Some((item, reader));
            }
            if reader.terminated || reader.body_ended {
                return None;
            }

            match reader.body.next().await {
                Some(Ok(bytes)) => {
                    for frame in reader.decoder.push(bytes.as_ref()) {
                        reader.translate(&frame);
                    }
                }
                Some(Err(e)) => {
                    reader.terminate(Err(LlmError::network(format!("Stream interrupted: {e}"))));
                }
                None => {
                    if let Some(frame) = reader.decoder.finish() {
                        reader.translate(&frame);
                    }
                    reader.body_ended = true;
                }
            }
        }
    })
    .boxed()
}

struct FrameReader<B, E> {
    body: futures::stream::BoxStream<'static, Result<B, E>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<ProviderEvent, LlmError>>,
    /// A terminal item has been queued; later frames are ignored
    terminated: bool,
    body_ended: bool,
}

impl<B, E> FrameReader<B, E> {
    fn terminate(&mut self, item: Result<ProviderEvent, LlmError>) {
        if !self.terminated {
            self.terminated = true;
            self.pending.push_back(item);
        }
    }

    fn translate(&mut self, frame: &SseFrame) {
        if self.terminated {
            return;
        }

        let data = frame.data.trim();
        if data == "[DONE]" {
            self.terminate(Ok(ProviderEvent::Finished { reason: None }));
            return;
        }

        let chunk: OpenAiStreamChunk = match serde_json::from_str(data) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparseable provider frame");
                return;
            }
        };

        if let Some(err) = chunk.error {
            self.terminate(Err(LlmError::generation(err.message)));
            return;
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            // Usage-only and keep-alive payloads carry no choices
            return;
        };

        if let Some(text) = choice.delta.and_then(|d| d.content) {
            if !text.is_empty() {
                self.pending.push_back(Ok(ProviderEvent::TextDelta(text)));
            }
        }

        match choice.finish_reason {
            Some(reason) if reason == "error" => {
                self.terminate(Err(LlmError::generation("Provider reported a generation error")));
            }
            Some(reason) => {
                self.terminate(Ok(ProviderEvent::Finished {
                    reason: Some(reason),
                }));
            }
            None => {}
        }
    }
}

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    error: Option<OpenAiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use crate::wire::Role;

    type Body = Vec<Result<Vec<u8>, String>>;

    fn body(parts: &[&str]) -> Body {
        parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect()
    }

    async fn collect(body: Body) -> Vec<Result<ProviderEvent, LlmError>> {
        translate_stream(stream::iter(body)).collect().await
    }

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
        )
    }

    fn texts(events: &[Result<ProviderEvent, LlmError>]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(ProviderEvent::TextDelta(t)) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn relays_deltas_then_done() {
        let events = collect(body(&[
            ": OPENROUTER PROCESSING\n\n",
            &delta("Here"),
            &delta(" is"),
            &delta(""),
            &delta(" a function:"),
            "data: [DONE]\n\n",
        ]))
        .await;

        assert_eq!(texts(&events), vec!["Here", " is", " a function:"]);
        assert!(matches!(
            events.last(),
            Some(Ok(ProviderEvent::Finished { reason: None }))
        ));
    }

    #[tokio::test]
    async fn frames_split_across_reads() {
        let frame = delta("hello");
        let (a, b) = frame.split_at(7);
        let events = collect(body(&[a, b, "data: [DO", "NE]\n\n"])).await;
        assert_eq!(texts(&events), vec!["hello"]);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn finish_reason_terminates_and_ignores_rest() {
        let stop = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"!\"},",
            "\"finish_reason\":\"stop\"}]}\n\n",
        );
        let events = collect(body(&[stop, &delta("late"), "data: [DONE]\n\n"])).await;
        assert_eq!(texts(&events), vec!["!"]);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            Ok(ProviderEvent::Finished { reason: Some(r) }) if r == "stop"
        ));
    }

    #[tokio::test]
    async fn embedded_error_is_generation_failure() {
        let err = "data: {\"error\":{\"message\":\"model overloaded\",\"code\":502}}\n\n";
        let events = collect(body(&[&delta("Partial a"), err])).await;
        assert_eq!(texts(&events), vec!["Partial a"]);
        match &events[1] {
            Err(e) => {
                assert_eq!(e.kind, LlmErrorKind::Generation);
                assert_eq!(e.message, "model overloaded");
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_mid_stream() {
        let mut parts = body(&[&delta("a")]);
        parts.push(Err("connection reset".to_string()));
        let events = collect(parts).await;
        assert_eq!(texts(&events), vec!["a"]);
        assert!(matches!(&events[1], Err(e) if e.kind == LlmErrorKind::Network));
    }

    #[tokio::test]
    async fn eof_without_marker_just_ends() {
        let events = collect(body(&[&delta("a")])).await;
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn status_classification() {
        let body = r#"{"error":{"message":"No auth credentials found"}}"#;
        let err = classify_status(401, body);
        assert_eq!(err.kind, LlmErrorKind::Auth);
        assert!(err.message.contains("No auth credentials found"));

        assert_eq!(classify_status(429, "").kind, LlmErrorKind::RateLimit);
        assert_eq!(classify_status(400, "").kind, LlmErrorKind::InvalidRequest);
        assert_eq!(classify_status(503, "").kind, LlmErrorKind::ServerError);
        assert_eq!(classify_status(418, "teapot").kind, LlmErrorKind::Unknown);
    }

    #[test]
    fn request_includes_system_and_params() {
        let config = LlmConfig {
            api_key: Some("k".to_string()),
            base_url: "https://example.test/v1/".to_string(),
            ..LlmConfig::default()
        };
        let provider = OpenAiCompatProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint, "https://example.test/v1/chat/completions");

        let params = CompletionParams {
            system: Some("be brief".to_string()),
            ..CompletionParams::default()
        };
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let request = serde_json::to_value(provider.translate_request(&history, &params)).unwrap();

        assert_eq!(request["stream"], serde_json::json!(true));
        assert_eq!(request["max_tokens"], serde_json::json!(2000));
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["role"], Role::User.as_str());
        assert_eq!(request["messages"][2]["content"], "hello");
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let provider = OpenAiCompatProvider::new(&LlmConfig::default()).unwrap();
        assert!(!provider.is_configured());
        let result = provider
            .stream(&[ChatMessage::user("hi")], &CompletionParams::default())
            .await;
        assert!(matches!(result, Err(e) if e.kind == LlmErrorKind::Unconfigured));
    }
}
