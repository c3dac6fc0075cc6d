//! Static process configuration, read once at start-up.
//!
//! ```toml
//! [executor]
//! item_timeout_ms = 60000
//! cancel_policy = "drain"
//!
//! [retry]
//! max_attempts = 3
//!
//! [classifier]
//! timeout_ms = 30000
//!
//! [llm]
//! host = "http://localhost:11434"
//! model = "phi4"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core::executor::{CancelPolicy, ExecutorConfig};
use crate::core::orchestrator::OrchestratorConfig;
use crate::core::retry::RetryPolicy;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_ENV: &str = "EUDA_ORCHESTRATOR_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub executor: ExecutorSection,
    pub retry: RetrySection,
    pub classifier: ClassifierSection,
    pub llm: LlmSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    pub item_timeout_ms: u64,
    pub cancel_policy: CancelPolicy,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        ExecutorSection {
            item_timeout_ms: 60_000,
            cancel_policy: CancelPolicy::Drain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        RetrySection {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
            multiplier: 2.0,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            multiplier: self.multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub timeout_ms: u64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        ClassifierSection {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
            multiplier: 2.0,
            timeout_ms: 30_000,
        }
    }
}

/// Connection settings for the LLM-backed collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub host: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LlmSection {
    fn default() -> Self {
        LlmSection {
            host: "http://localhost:11434".to_string(),
            model: "phi4".to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make every attempt fail immediately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = |field: &'static str| ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        };
        if self.executor.item_timeout_ms == 0 {
            return Err(zero("executor.item_timeout_ms"));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(zero("classifier.timeout_ms"));
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads the file named by [`CONFIG_ENV`], or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                log::info!("Loading configuration from {:?}", path);
                Self::load(path)
            }
            None => {
                log::debug!("{} not set, using default configuration", CONFIG_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            executor: ExecutorConfig {
                item_timeout: Duration::from_millis(self.executor.item_timeout_ms),
                retry: self.retry.policy(),
                cancel_policy: self.executor.cancel_policy,
            },
            classifier_retry: RetryPolicy {
                max_attempts: self.classifier.max_attempts,
                initial_backoff: Duration::from_millis(self.classifier.initial_backoff_ms),
                max_backoff: Duration::from_millis(self.classifier.max_backoff_ms),
                multiplier: self.classifier.multiplier,
            },
            classifier_timeout: Duration::from_millis(self.classifier.timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.executor.retry.max_attempts, 3);
        assert_eq!(orchestrator.executor.item_timeout, Duration::from_secs(60));
        assert_eq!(orchestrator.classifier_timeout, Duration::from_secs(30));
        assert_eq!(config.llm.model, "phi4");
    }

    #[test]
    fn test_partial_sections_override_selected_fields() {
        let config = Config::from_toml_str(
            r#"
            [executor]
            cancel_policy = "abandon"

            [retry]
            max_attempts = 5
            initial_backoff_ms = 10

            [llm]
            model = "llama3"
            temperature = 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.executor.cancel_policy, CancelPolicy::Abandon);
        assert_eq!(config.executor.item_timeout_ms, 60_000);
        let policy = config.retry.policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(10));
        assert_eq!(policy.max_backoff, Duration::from_secs(4));
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.temperature, Some(0.2));
        assert_eq!(config.llm.host, "http://localhost:11434");
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = Config::from_toml_str("[executor]\ncancel_policy = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let err = Config::from_toml_str("[executor]\nitem_timeout_ms = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "executor.item_timeout_ms", .. }
        ));

        let err = Config::from_toml_str("[classifier]\ntimeout_ms = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { field: "classifier.timeout_ms", .. }
        ));
    }

    #[test]
    fn test_classifier_backoff_multiplier_is_its_own() {
        let config = Config::from_toml_str(
            r#"
            [retry]
            multiplier = 3.0

            [classifier]
            multiplier = 1.5
            "#,
        )
        .unwrap();

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.executor.retry.multiplier, 3.0);
        assert_eq!(orchestrator.classifier_retry.multiplier, 1.5);
        assert_eq!(Config::default().classifier.multiplier, 2.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
