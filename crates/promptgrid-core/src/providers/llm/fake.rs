use super::{ChatRequest, CompletionResponse, LlmProvider};
use crate::errors::ProviderFailure;
use crate::model::TokenUsage;
use async_trait::async_trait;
use std::time::Duration;

type FailureRule = Box<dyn Fn(&ChatRequest<'_>) -> Option<ProviderFailure> + Send + Sync>;

/// Deterministic provider without network I/O. Echoes the user text.
#[derive(Default)]
pub struct FakeProvider {
    latency: Duration,
    reported_model: Option<String>,
    rules: Vec<FailureRule>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Report a different observed model than the one requested.
    pub fn reporting_model(mut self, model: impl Into<String>) -> Self {
        self.reported_model = Some(model.into());
        self
    }

    /// The first rule returning `Some` decides the failure for a request.
    pub fn fail_when(
        mut self,
        rule: impl Fn(&ChatRequest<'_>) -> Option<ProviderFailure> + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    async fn chat(&self, request: &ChatRequest<'_>) -> Result<CompletionResponse, ProviderFailure> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(failure) = self.rules.iter().find_map(|rule| rule(request)) {
            return Err(failure);
        }

        let content = format!("[{}] {}", request.model, request.user);
        let input = (request.system.split_whitespace().count()
            + request.user.split_whitespace().count()) as u64;
        let output = content.split_whitespace().count() as u64;
        Ok(CompletionResponse {
            content,
            model: Some(
                self.reported_model
                    .clone()
                    .unwrap_or_else(|| request.model.to_string()),
            ),
            usage: Some(TokenUsage {
                input_tokens: Some(input),
                output_tokens: Some(output),
                total_tokens: Some(input + output),
            }),
            finish_reason: Some("stop".to_string()),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureHint;

    fn request<'a>(system: &'a str, user: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: "modelZ",
            system,
            user,
            temperature: 0.1,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn echoes_user_text() {
        let resp = FakeProvider::new()
            .chat(&request("be brief", "hello there"))
            .await
            .unwrap();
        assert_eq!(resp.content, "[modelZ] hello there");
        assert_eq!(resp.model.as_deref(), Some("modelZ"));
        assert_eq!(resp.usage.unwrap().input_tokens, Some(4));
    }

    #[tokio::test]
    async fn scripted_rule_fails_matching_request_only() {
        let fake = FakeProvider::new().fail_when(|req| {
            req.user
                .contains("boom")
                .then(|| ProviderFailure::new(FailureHint::Timeout, "timed out"))
        });
        assert!(fake.chat(&request("s", "fine")).await.is_ok());
        let err = fake.chat(&request("s", "boom")).await.unwrap_err();
        assert_eq!(err.hint, FailureHint::Timeout);
    }
}
