use super::{transport_failure, wire_model_name, ChatRequest, CompletionResponse, LlmProvider};
use crate::errors::{FailureHint, ProviderFailure};
use crate::model::TokenUsage;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
/// The messages API requires an explicit output budget.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, request: &ChatRequest<'_>) -> Result<CompletionResponse, ProviderFailure> {
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": wire_model_name(request.model),
            "system": request.system,
            "messages": [{ "role": "user", "content": request.user }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_failure("anthropic", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(ProviderFailure::new(
                FailureHint::HttpStatus(status.as_u16()),
                format!("Anthropic messages API error: {}", error_text),
            ));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| transport_failure("anthropic", &e))?;
        parse_messages_response(&json)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

pub(crate) fn parse_messages_response(
    json: &serde_json::Value,
) -> Result<CompletionResponse, ProviderFailure> {
    let blocks = json
        .get("content")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ProviderFailure::message("Anthropic API response missing content"))?;
    let content: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    let usage = json.get("usage").map(|u| {
        let input = u.get("input_tokens").and_then(|v| v.as_u64());
        let output = u.get("output_tokens").and_then(|v| v.as_u64());
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input.zip(output).map(|(i, o)| i + o),
        }
    });

    Ok(CompletionResponse {
        content,
        model: json
            .get("model")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        usage,
        finish_reason: json
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_sums_usage() {
        let body = json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [
                { "type": "text", "text": "Hello" },
                { "type": "tool_use", "id": "x" },
                { "type": "text", "text": " world" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 2 }
        });
        let resp = parse_messages_response(&body).unwrap();
        assert_eq!(resp.content, "Hello world");
        assert_eq!(resp.finish_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.usage.unwrap().total_tokens, Some(12));
    }
}
