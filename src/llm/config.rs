//! Provider configuration read from the process environment

use super::types::{CompletionParams, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::system_prompt::DEFAULT_SYSTEM_PROMPT;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Configuration for the completion provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Provider credential; `None` when unset or empty
    pub api_key: Option<String>,
    pub model: String,
    /// OpenAI-compatible API root (e.g. `https://openrouter.ai/api/v1`)
    pub base_url: String,
    pub params: CompletionParams,
    /// Maximum wait for each provider chunk; `None` waits forever
    pub chunk_timeout: Option<Duration>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            params: CompletionParams {
                system: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
                ..CompletionParams::default()
            },
            chunk_timeout: None,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_key = lookup("OPENROUTER_API_KEY").filter(|k| !k.trim().is_empty());
        let model = lookup("CHAT_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(defaults.model);
        let base_url = lookup("LLM_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(defaults.base_url);

        let system = match lookup("CHAT_SYSTEM_PROMPT") {
            // An explicitly empty prompt disables the system message
            Some(prompt) if prompt.trim().is_empty() => None,
            Some(prompt) => Some(prompt),
            None => defaults.params.system,
        };

        let temperature =
            parse_or("CHAT_TEMPERATURE", lookup("CHAT_TEMPERATURE"), DEFAULT_TEMPERATURE);
        let max_tokens = parse_or("CHAT_MAX_TOKENS", lookup("CHAT_MAX_TOKENS"), DEFAULT_MAX_TOKENS);
        let chunk_timeout = lookup("CHAT_CHUNK_TIMEOUT_SECS")
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(e) => {
                    tracing::warn!(
                        value = %raw,
                        error = %e,
                        "Ignoring invalid CHAT_CHUNK_TIMEOUT_SECS"
                    );
                    None
                }
            })
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Self {
            api_key,
            model,
            base_url,
            params: CompletionParams {
                system,
                temperature,
                max_tokens,
            },
            chunk_timeout,
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            tracing::warn!(var = name, value = %raw, error = %e, "Invalid value, using default");
            default
        }),
    }
}
