pub mod anthropic;
pub mod fake;
pub mod openai;

use crate::errors::{FailureHint, ProviderFailure};
use crate::model::TokenUsage;
use async_trait::async_trait;

/// One chat call: system instructions plus a single user message.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    /// Model the provider reports having used.
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

/// A single provider wire format. Failures are returned raw; the client classifies them.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest<'_>) -> Result<CompletionResponse, ProviderFailure>;

    fn provider_name(&self) -> &'static str;
}

/// Strip a routing prefix (`openai/gpt-4o` → `gpt-4o`) before the name goes on the wire.
pub fn wire_model_name(model: &str) -> &str {
    for prefix in ["openai/", "anthropic/", "gemini/"] {
        if let Some(rest) = model.strip_prefix(prefix) {
            return rest;
        }
    }
    model
}

pub(crate) fn transport_failure(provider: &str, err: &reqwest::Error) -> ProviderFailure {
    let hint = if err.is_timeout() {
        FailureHint::Timeout
    } else if err.is_connect() || err.is_request() {
        FailureHint::Transport
    } else {
        FailureHint::None
    };
    ProviderFailure::new(hint, format!("{} request failed: {}", provider, err))
}

#[cfg(test)]
mod tests {
    use super::wire_model_name;

    #[test]
    fn routing_prefix_is_stripped() {
        assert_eq!(wire_model_name("gemini/gemini-1.5-flash"), "gemini-1.5-flash");
        assert_eq!(wire_model_name("anthropic/claude-3-5-haiku"), "claude-3-5-haiku");
        assert_eq!(wire_model_name("gpt-4o-mini"), "gpt-4o-mini");
        assert_eq!(wire_model_name("meta/llama"), "meta/llama");
    }
}
