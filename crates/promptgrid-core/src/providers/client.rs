use super::gate::RequestGate;
use super::llm::anthropic::{self, AnthropicProvider};
use super::llm::fake::FakeProvider;
use super::llm::openai::{self, OpenAiProvider};
use super::llm::{ChatRequest, CompletionResponse, LlmProvider};
use crate::config::{AppConfig, ConfigError, ModelConfig, ProviderKind};
use crate::errors::{CompletionError, ErrorKind, FailureHint, ProviderFailure};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info_span, Instrument};

/// Issues single completion calls to configured models through a shared [`RequestGate`].
///
/// Knows nothing about prompts, test cases or runs.
pub struct CompletionClient {
    providers: BTreeMap<String, Arc<dyn LlmProvider>>,
    gate: Arc<RequestGate>,
    timeout: Duration,
}

impl CompletionClient {
    pub fn new(gate: Arc<RequestGate>, timeout: Duration) -> Self {
        Self {
            providers: BTreeMap::new(),
            gate,
            timeout,
        }
    }

    pub fn with_model(mut self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(name.into(), provider);
        self
    }

    /// Build providers for every configured model. Fails if a credential cannot be resolved.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ConfigError> {
        let gate = Arc::new(RequestGate::new(
            cfg.max_concurrent_requests,
            cfg.request_delay()?,
        ));
        let mut client = Self::new(gate, cfg.request_timeout()?);
        for m in &cfg.models {
            client = client.with_model(m.name.clone(), build_provider(m)?);
        }
        Ok(client)
    }

    /// Configured model identifiers, sorted and unique.
    pub fn list_models(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        model: &str,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<CompletionResponse, CompletionError> {
        let provider = self
            .providers
            .get(model)
            .ok_or_else(|| CompletionError::UnknownModel {
                model: model.to_string(),
                available: self.list_models(),
            })?;

        let span = info_span!(
            "llm.request",
            "llm.provider" = provider.provider_name(),
            "llm.model.requested" = model,
            "llm.model.observed" = tracing::field::Empty,
            "llm.duration_ms" = tracing::field::Empty,
            "error" = tracing::field::Empty,
            "error.kind" = tracing::field::Empty
        );

        async move {
            let _permit = self.gate.acquire().await.map_err(|_| {
                CompletionError::classify(model, &ProviderFailure::message("request gate closed"))
            })?;

            let request = ChatRequest {
                model,
                system,
                user,
                temperature,
                max_tokens,
            };
            let start = tokio::time::Instant::now();
            let outcome = match tokio::time::timeout(self.timeout, provider.chat(&request)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderFailure::new(
                    FailureHint::Timeout,
                    format!(
                        "request exceeded time budget of {:.1}s",
                        self.timeout.as_secs_f64()
                    ),
                )),
            };

            let span = tracing::Span::current();
            span.record("llm.duration_ms", start.elapsed().as_millis() as u64);
            match outcome {
                Ok(resp) => {
                    if let Some(observed) = &resp.model {
                        span.record("llm.model.observed", observed.as_str());
                    }
                    Ok(resp)
                }
                Err(failure) => {
                    let err = CompletionError::classify(model, &failure);
                    let kind = err.kind().unwrap_or(ErrorKind::UnknownError);
                    span.record("error", true);
                    span.record("error.kind", kind.as_str());
                    tracing::debug!(error = %err, "completion failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn build_provider(m: &ModelConfig) -> Result<Arc<dyn LlmProvider>, ConfigError> {
    let kind = m.provider_kind();
    if kind == ProviderKind::Fake {
        return Ok(Arc::new(FakeProvider::new()));
    }

    let key = m.resolve_api_key().ok_or_else(|| {
        ConfigError::Invalid(format!(
            "no API key for model '{}' (set api_key in config or {})",
            m.name,
            m.key_env_vars().join(" / ")
        ))
    })?;

    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::new(key).with_base_url(
                m.base_url
                    .clone()
                    .unwrap_or_else(|| anthropic::DEFAULT_BASE_URL.to_string()),
            ),
        ),
        _ => {
            let default_url = if m.name.to_lowercase().contains("gemini") {
                openai::GEMINI_COMPAT_BASE_URL
            } else {
                openai::DEFAULT_BASE_URL
            };
            Arc::new(
                OpenAiProvider::new(key)
                    .with_base_url(m.base_url.clone().unwrap_or_else(|| default_url.to_string())),
            )
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeProvider;

    fn client_with(provider: FakeProvider, timeout: Duration) -> CompletionClient {
        CompletionClient::new(Arc::new(RequestGate::unpaced(2)), timeout)
            .with_model("modelZ", Arc::new(provider))
    }

    #[tokio::test]
    async fn unknown_model_fails_without_calling_provider() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = calls.clone();
        let fake = FakeProvider::new().fail_when(move |_| {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            None
        });
        let client = client_with(fake, Duration::from_secs(5));

        let err = client
            .complete("s", "u", "gpt-unknown", 0.1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::UnknownModel { .. }));
        assert_eq!(err.error_type(), "InvalidConfiguration");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failures_are_classified_once() {
        let fake = FakeProvider::new()
            .fail_when(|_| Some(ProviderFailure::message("Error 429: rate limit reached")));
        let client = client_with(fake, Duration::from_secs(5));
        let err = client
            .complete("s", "u", "modelZ", 0.1, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::RateLimit));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_hits_time_budget() {
        let fake = FakeProvider::new().with_latency(Duration::from_secs(30));
        let client = client_with(fake, Duration::from_secs(2));
        let err = client
            .complete("s", "u", "modelZ", 0.1, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Timeout));
        assert!(err.to_string().contains("time budget"));
    }

    #[tokio::test]
    async fn success_reports_observed_model() {
        let client = client_with(
            FakeProvider::new().reporting_model("modelZ-2024"),
            Duration::from_secs(5),
        );
        let resp = client
            .complete("s", "hello", "modelZ", 0.1, Some(16))
            .await
            .unwrap();
        assert_eq!(resp.model.as_deref(), Some("modelZ-2024"));
        assert_eq!(client.list_models(), vec!["modelZ".to_string()]);
    }

    #[test]
    fn from_config_requires_credentials_for_remote_models() {
        let mut m = ModelConfig::new("claude-test-model");
        m.api_key = Some("env:PROMPTGRID_TEST_KEY_THAT_IS_NOT_SET".into());
        let cfg = AppConfig {
            models: vec![m, ModelConfig::new("fake")],
            ..AppConfig::default()
        };
        let err = CompletionClient::from_config(&cfg).err().unwrap();
        assert!(err.to_string().contains("no API key for model 'claude-test-model'"));

        let cfg = AppConfig {
            models: vec![ModelConfig::new("fake")],
            max_concurrent_requests: 3,
            ..AppConfig::default()
        };
        let client = CompletionClient::from_config(&cfg).unwrap();
        assert_eq!(client.gate().max_concurrent(), 3);
        assert_eq!(client.list_models(), vec!["fake".to_string()]);
    }

    #[test]
    fn from_config_rejects_unrepresentable_delay() {
        let cfg = AppConfig {
            models: vec![ModelConfig::new("fake")],
            request_delay_seconds: 1e20,
            ..AppConfig::default()
        };
        let err = CompletionClient::from_config(&cfg).err().unwrap();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("request_delay_seconds"));
    }
}
