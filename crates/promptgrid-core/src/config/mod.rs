use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Configuration file not found: {path}\n\
         Please copy config.template.json to config.json and configure your API keys."
    )]
    Missing { path: PathBuf },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("config error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (also Gemini's compatibility endpoint).
    Openai,
    Anthropic,
    /// Offline echo provider, no network.
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    /// Literal key, `env:VAR`, or absent (resolved from the environment by model name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: None,
            api_key: None,
            base_url: None,
        }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        if let Some(kind) = self.provider {
            return kind;
        }
        let name = self.name.to_lowercase();
        if name.contains("claude") || name.contains("anthropic") {
            ProviderKind::Anthropic
        } else if name == "fake" || name.starts_with("fake/") {
            ProviderKind::Fake
        } else {
            ProviderKind::Openai
        }
    }

    /// Environment variables consulted, in order, when no key is configured.
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        let name = self.name.to_lowercase();
        if name.contains("gpt") || name.contains("openai") {
            &["OPENAI_API_KEY"]
        } else if name.contains("claude") || name.contains("anthropic") {
            &["ANTHROPIC_API_KEY"]
        } else if name.contains("gemini") || name.contains("google") {
            &["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        } else {
            match self.provider_kind() {
                ProviderKind::Anthropic => &["ANTHROPIC_API_KEY"],
                ProviderKind::Openai => &["OPENAI_API_KEY"],
                ProviderKind::Fake => &[],
            }
        }
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.resolve_api_key_with(|var| std::env::var(var).ok())
    }

    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if key.starts_with("env:") => {
                lookup(key.trim_start_matches("env:")).filter(|v| !v.is_empty())
            }
            Some(key) if !key.is_empty() => Some(key.to_string()),
            _ => self
                .key_env_vars()
                .iter()
                .find_map(|var| lookup(var).filter(|v| !v.is_empty())),
        }
    }
}

/// Upper bound for `request_delay_seconds` (one day).
pub const MAX_REQUEST_DELAY_SECONDS: f64 = 86_400.0;
/// Upper bound for `request_timeout_seconds` (one hour).
pub const MAX_REQUEST_TIMEOUT_SECONDS: f64 = 3_600.0;

fn default_request_delay() -> f64 {
    1.0
}

fn default_max_concurrent() -> usize {
    5
}

fn default_timeout() -> f64 {
    120.0
}

fn default_temperature() -> f32 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Minimum time between successive call starts, across all callers.
    #[serde(default = "default_request_delay")]
    pub request_delay_seconds: f64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: f64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            request_delay_seconds: default_request_delay(),
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_seconds: default_timeout(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl AppConfig {
    /// Load from `.json`, `.yaml` or `.yml` and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str::<AppConfig>(&raw).map_err(|e| e.to_string())
        } else {
            serde_json::from_str::<AppConfig>(&raw).map_err(|e| e.to_string())
        };
        let cfg = parsed.map_err(|detail| ConfigError::Parse {
            path: path.to_path_buf(),
            detail,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one model must be configured".into(),
            ));
        }
        let mut seen = std::collections::BTreeSet::new();
        for m in &self.models {
            if m.name.trim().is_empty() {
                return Err(ConfigError::Invalid("model name must not be empty".into()));
            }
            if !seen.insert(m.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "model '{}' is configured twice",
                    m.name
                )));
            }
        }
        if !self.request_delay_seconds.is_finite() || self.request_delay_seconds < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "request_delay_seconds must be >= 0 (got {})",
                self.request_delay_seconds
            )));
        }
        if self.request_delay_seconds > MAX_REQUEST_DELAY_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "request_delay_seconds must be <= {MAX_REQUEST_DELAY_SECONDS} (got {})",
                self.request_delay_seconds
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_requests must be >= 1".into(),
            ));
        }
        if !self.request_timeout_seconds.is_finite() || self.request_timeout_seconds <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "request_timeout_seconds must be > 0 (got {})",
                self.request_timeout_seconds
            )));
        }
        if self.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "request_timeout_seconds must be <= {MAX_REQUEST_TIMEOUT_SECONDS} (got {})",
                self.request_timeout_seconds
            )));
        }
        Ok(())
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }

    pub fn request_delay(&self) -> Result<Duration, ConfigError> {
        seconds("request_delay_seconds", self.request_delay_seconds.max(0.0))
    }

    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        seconds("request_timeout_seconds", self.request_timeout_seconds.max(0.001))
    }

    /// Keep only the named models. Every name must already be configured.
    pub fn restrict_models(&mut self, names: &[String]) -> Result<(), ConfigError> {
        if names.is_empty() {
            return Ok(());
        }
        if let Some(missing) = names
            .iter()
            .find(|n| !self.models.iter().any(|m| &m.name == *n))
        {
            return Err(ConfigError::Invalid(format!(
                "model '{}' not found in configuration. Available models: {:?}",
                missing,
                self.model_names()
            )));
        }
        self.models.retain(|m| names.contains(&m.name));
        Ok(())
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| ConfigError::Invalid(format!("{field} is out of range ({value}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn json_defaults_apply() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"models":[{"name":"gpt-4o-mini","api_key":"sk-1"}]}"#)
                .unwrap();
        assert_eq!(cfg.request_delay_seconds, 1.0);
        assert_eq!(cfg.max_concurrent_requests, 5);
        assert_eq!(cfg.request_timeout().unwrap(), Duration::from_secs(120));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_reads_yaml_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "models:\n  - name: claude-3-5-haiku\n    api_key: k\nmax_concurrent_requests: 2\n",
        )
        .unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.max_concurrent_requests, 2);
        assert_eq!(cfg.models[0].provider_kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn load_missing_file_has_hint() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
        assert!(err.to_string().contains("config.template.json"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppConfig::load(&path).unwrap_err(),
            ConfigError::Parse { .. }
        ));
    }

    #[test]
    fn validate_rejects_bad_limits() {
        let mut cfg = AppConfig {
            models: vec![ModelConfig::new("fake")],
            ..AppConfig::default()
        };
        cfg.max_concurrent_requests = 0;
        assert!(cfg.validate().is_err());
        cfg.max_concurrent_requests = 1;
        cfg.request_delay_seconds = -1.0;
        assert!(cfg.validate().is_err());
        cfg.request_delay_seconds = 0.0;
        cfg.models.push(ModelConfig::new("fake"));
        assert!(cfg
            .validate()
            .unwrap_err()
            .to_string()
            .contains("configured twice"));
    }

    #[test]
    fn huge_durations_are_rejected_not_panicking() {
        let mut cfg = AppConfig {
            models: vec![ModelConfig::new("fake")],
            request_delay_seconds: 1e20,
            ..AppConfig::default()
        };
        assert!(cfg
            .validate()
            .unwrap_err()
            .to_string()
            .contains("request_delay_seconds must be <="));
        assert!(matches!(cfg.request_delay(), Err(ConfigError::Invalid(_))));

        cfg.request_delay_seconds = MAX_REQUEST_DELAY_SECONDS;
        cfg.request_timeout_seconds = 1e20;
        assert!(cfg
            .validate()
            .unwrap_err()
            .to_string()
            .contains("request_timeout_seconds must be <="));
        assert!(matches!(cfg.request_timeout(), Err(ConfigError::Invalid(_))));

        cfg.request_timeout_seconds = MAX_REQUEST_TIMEOUT_SECONDS;
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.request_delay().unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn api_key_resolution_follows_model_name() {
        let env: HashMap<&str, &str> = [("GOOGLE_API_KEY", "g-key"), ("MY_KEY", "custom")]
            .into_iter()
            .collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let gemini = ModelConfig::new("gemini/gemini-1.5-flash");
        assert_eq!(gemini.resolve_api_key_with(lookup), Some("g-key".into()));

        let mut explicit = ModelConfig::new("gpt-4o");
        explicit.api_key = Some("env:MY_KEY".into());
        assert_eq!(explicit.resolve_api_key_with(lookup), Some("custom".into()));

        let gpt = ModelConfig::new("gpt-4o");
        assert_eq!(gpt.resolve_api_key_with(lookup), None);
    }

    #[test]
    fn restrict_models_rejects_unknown_names() {
        let mut cfg = AppConfig {
            models: vec![ModelConfig::new("a"), ModelConfig::new("b")],
            ..AppConfig::default()
        };
        assert!(cfg.restrict_models(&["c".to_string()]).is_err());
        cfg.restrict_models(&["b".to_string()]).unwrap();
        assert_eq!(cfg.model_names(), vec!["b".to_string()]);
    }
}
