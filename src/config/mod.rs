mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::*;
use std::path::Path;
use tracing::debug;

impl Default for Config {
    fn default() -> Self {
        Self {
            user: default_user(),
            store_dir: default_store_dir(),
            model: default_model(),
            endpoint: default_endpoint(),
            call_timeout_sec: default_call_timeout_sec(),
            retry: RetryConfig::default(),
            save_debounce_ms: default_save_debounce_ms(),
            history_limit: default_history_limit(),
        }
    }
}

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load config if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "user",
                reason: "must not be empty".to_string(),
            });
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "model",
                reason: "must not be empty".to_string(),
            });
        }

        if self.retry.retries_per_credential == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.retries_per_credential",
                reason: "at least one attempt per key is required".to_string(),
            });
        }

        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            return Err(ConfigError::Invalid {
                field: "retry.backoff_max_ms",
                reason: format!(
                    "must be at least backoff_base_ms ({})",
                    self.retry.backoff_base_ms
                ),
            });
        }

        if self.history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "history_limit",
                reason: "must keep at least one entry".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("user: alice\nretry:\n  retries_per_credential: 2\n").unwrap();
        assert_eq!(config.user, "alice");
        assert_eq!(config.retry.retries_per_credential, 2);
        assert_eq!(config.retry.backoff_base_ms, 1500);
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.model, "gemini-2.5-flash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut config = Config::default();
        config.retry.retries_per_credential = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "retry.retries_per_credential",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.retry.backoff_base_ms = 5000;
        config.retry.backoff_max_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.user, "default");
    }
}
