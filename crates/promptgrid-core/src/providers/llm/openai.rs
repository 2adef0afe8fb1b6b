use super::{transport_failure, wire_model_name, ChatRequest, CompletionResponse, LlmProvider};
use crate::errors::{FailureHint, ProviderFailure};
use crate::model::TokenUsage;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const GEMINI_COMPAT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
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
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: &ChatRequest<'_>) -> Result<CompletionResponse, ProviderFailure> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let mut body = json!({
            "model": wire_model_name(request.model),
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_failure("openai", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(ProviderFailure::new(
                FailureHint::HttpStatus(status.as_u16()),
                format!("OpenAI chat API error: {}", error_text),
            ));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| transport_failure("openai", &e))?;
        parse_chat_response(&json)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

pub(crate) fn parse_chat_response(
    json: &serde_json::Value,
) -> Result<CompletionResponse, ProviderFailure> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderFailure::message("OpenAI API response missing content"))?
        .to_string();

    let usage = json.get("usage").map(|u| TokenUsage {
        input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()),
        output_tokens: u.get("completion_tokens").and_then(|v| v.as_u64()),
        total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()),
    });

    Ok(CompletionResponse {
        content,
        model: json
            .get("model")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        usage,
        finish_reason: json
            .pointer("/choices/0/finish_reason")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_choices_usage_and_observed_model() {
        let body = json!({
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{ "message": { "content": "hi" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.content, "hi");
        assert_eq!(resp.model.as_deref(), Some("gpt-4o-mini-2024-07-18"));
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, Some(15));
    }

    #[test]
    fn missing_content_is_a_failure() {
        let err = parse_chat_response(&json!({ "choices": [] })).unwrap_err();
        assert_eq!(err.hint, FailureHint::None);
        assert!(err.message.contains("missing content"));
    }
}
