//! Failure taxonomy for completion calls.
//!
//! Classification is a best-effort heuristic over provider wording. Anything
//! that does not match falls back to [`ErrorKind::UnknownError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    ApiError,
    Timeout,
    NetworkError,
    InvalidModel,
    UnknownError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::RateLimit,
        ErrorKind::ApiError,
        ErrorKind::Timeout,
        ErrorKind::NetworkError,
        ErrorKind::InvalidModel,
        ErrorKind::UnknownError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::ApiError => "api_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::InvalidModel => "invalid_model",
            ErrorKind::UnknownError => "unknown_error",
        }
    }

    /// Name stored in `ErrorDetails::error_type`.
    pub fn error_type(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "RateLimitError",
            ErrorKind::ApiError => "APIError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::NetworkError => "NetworkError",
            ErrorKind::InvalidModel => "InvalidModelError",
            ErrorKind::UnknownError => "UnknownError",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ErrorKind::RateLimit => "Rate limit exceeded",
            ErrorKind::ApiError => "API error",
            ErrorKind::Timeout => "Request timeout",
            ErrorKind::NetworkError => "Network error",
            ErrorKind::InvalidModel => "Invalid model",
            ErrorKind::UnknownError => "Unclassified error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed signal a provider can attach to a failure, when it knows more than the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureHint {
    #[default]
    None,
    /// Transport-level timeout (the request never completed).
    Timeout,
    /// Connect or send failure before any response.
    Transport,
    /// The provider answered with a non-success HTTP status.
    HttpStatus(u16),
}

/// Raw, unclassified failure reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub hint: FailureHint,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(hint: FailureHint, message: impl Into<String>) -> Self {
        Self {
            hint,
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(FailureHint::None, message)
    }

    pub fn status(&self) -> Option<u16> {
        match self.hint {
            FailureHint::HttpStatus(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hint {
            FailureHint::HttpStatus(code) => write!(f, "status {}: {}", code, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Map a provider failure to a kind. Pure; evaluated once per failure.
pub fn classify_failure(model: &str, hint: FailureHint, message: &str) -> ErrorKind {
    match hint {
        FailureHint::Timeout => return ErrorKind::Timeout,
        FailureHint::Transport => return ErrorKind::NetworkError,
        _ => {}
    }

    let msg = message.to_lowercase();

    if model.to_lowercase().contains("gemini") {
        if msg.contains("gemini_api_key") || msg.contains("google_api_key") {
            return ErrorKind::ApiError;
        }
        if msg.contains("quota exceeded") || msg.contains("billing") {
            return ErrorKind::RateLimit;
        }
    }

    if msg.contains("rate limit") || msg.contains("429") {
        ErrorKind::RateLimit
    } else if msg.contains("api key") || msg.contains("authentication") || msg.contains("401") {
        ErrorKind::ApiError
    } else if msg.contains("timeout") {
        ErrorKind::Timeout
    } else if msg.contains("network") || msg.contains("connection") {
        ErrorKind::NetworkError
    } else if msg.contains("model") && (msg.contains("not found") || msg.contains("invalid")) {
        ErrorKind::InvalidModel
    } else if let FailureHint::HttpStatus(code) = hint {
        match code {
            429 => ErrorKind::RateLimit,
            408 | 504 => ErrorKind::Timeout,
            404 if msg.contains("model") => ErrorKind::InvalidModel,
            _ => ErrorKind::ApiError,
        }
    } else {
        ErrorKind::UnknownError
    }
}

/// Credential problems are stored as `api_error` but keep their own error type.
pub fn is_authentication_failure(model: &str, hint: FailureHint, message: &str) -> bool {
    if classify_failure(model, hint, message) != ErrorKind::ApiError {
        return false;
    }
    let msg = message.to_lowercase();
    let gemini_key = model.to_lowercase().contains("gemini")
        && (msg.contains("gemini_api_key") || msg.contains("google_api_key"));
    gemini_key
        || msg.contains("api key")
        || msg.contains("authentication")
        || msg.contains("401")
        || hint == FailureHint::HttpStatus(401)
}

/// Failure of a single completion call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// The caller asked for a model this client was not configured with. No I/O happened.
    #[error("Model '{model}' not found in configuration. Available models: {available:?}")]
    UnknownModel {
        model: String,
        available: Vec<String>,
    },

    #[error("{} for model {model}: {message}", .kind.label())]
    Provider {
        kind: ErrorKind,
        /// `ErrorDetails::error_type`; finer than `kind` for credential failures.
        error_type: &'static str,
        model: String,
        message: String,
        status: Option<u16>,
    },
}

impl CompletionError {
    pub fn classify(model: &str, failure: &ProviderFailure) -> Self {
        let kind = classify_failure(model, failure.hint, &failure.message);
        let error_type = if is_authentication_failure(model, failure.hint, &failure.message) {
            "AuthenticationError"
        } else {
            kind.error_type()
        };
        CompletionError::Provider {
            kind,
            error_type,
            model: model.to_string(),
            message: failure.to_string(),
            status: failure.status(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CompletionError::UnknownModel { .. } => None,
            CompletionError::Provider { kind, .. } => Some(*kind),
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            CompletionError::UnknownModel { .. } => "InvalidConfiguration",
            CompletionError::Provider { error_type, .. } => error_type,
        }
    }
}
