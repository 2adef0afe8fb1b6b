use crate::errors::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One unit of work: a prompt, a test case and the model to run them on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Combination {
    pub prompt_id: String,
    pub test_case_id: String,
    pub model_id: String,
}

impl Combination {
    pub fn new(
        prompt_id: impl Into<String>,
        test_case_id: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            test_case_id: test_case_id.into(),
            model_id: model_id.into(),
        }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} × {} × {}",
            self.prompt_id, self.test_case_id, self.model_id
        )
    }
}

/// Stored outcome status. Closed set: the database rejects anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    ApiError,
    Timeout,
    RateLimit,
    InvalidModel,
    NetworkError,
    UnknownError,
}

impl ResultStatus {
    pub const ALL: [ResultStatus; 7] = [
        ResultStatus::Success,
        ResultStatus::ApiError,
        ResultStatus::Timeout,
        ResultStatus::RateLimit,
        ResultStatus::InvalidModel,
        ResultStatus::NetworkError,
        ResultStatus::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::ApiError => "api_error",
            ResultStatus::Timeout => "timeout",
            ResultStatus::RateLimit => "rate_limit",
            ResultStatus::InvalidModel => "invalid_model",
            ResultStatus::NetworkError => "network_error",
            ResultStatus::UnknownError => "unknown_error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResultStatus::Success)
    }
}

impl From<ErrorKind> for ResultStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::RateLimit => ResultStatus::RateLimit,
            ErrorKind::ApiError => ResultStatus::ApiError,
            ErrorKind::Timeout => ResultStatus::Timeout,
            ErrorKind::NetworkError => ResultStatus::NetworkError,
            ErrorKind::InvalidModel => ResultStatus::InvalidModel,
            ErrorKind::UnknownError => ResultStatus::UnknownError,
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured detail attached to every non-success outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub error_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorDetails {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Token accounting as reported by the provider, normalized across wire formats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// In-memory outcome of one combination, before it is written to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    #[serde(flatten)]
    pub combination: Combination,
    pub system_text: String,
    pub user_text: String,
    pub response_text: Option<String>,
    /// Model the provider reports having used; may differ from `model_id`.
    pub observed_model: Option<String>,
    pub status: ResultStatus,
    pub error: Option<ErrorDetails>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub duration_ms: u64,
}

/// A persisted experiment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: i64,
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: ExperimentRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    #[default]
    Concurrent,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sequential => "sequential",
            ExecutionMode::Concurrent => "concurrent",
        }
    }
}

/// Settings captured when a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub models: Vec<String>,
    pub max_concurrent_requests: usize,
    pub request_delay_seconds: f64,
    pub prompts_count: usize,
    pub test_cases_count: usize,
    pub execution_mode: ExecutionMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_stored_taxonomy() {
        let strings: Vec<&str> = ResultStatus::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            strings,
            vec![
                "success",
                "api_error",
                "timeout",
                "rate_limit",
                "invalid_model",
                "network_error",
                "unknown_error"
            ]
        );
        for status in ResultStatus::ALL {
            assert_eq!(ResultStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(ResultStatus::parse("pass"), None);
    }

    #[test]
    fn every_error_kind_maps_to_a_failing_status() {
        for kind in ErrorKind::ALL {
            let status = ResultStatus::from(kind);
            assert!(!status.is_success());
            assert_eq!(status.as_str(), kind.as_str());
        }
    }
}
