use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    /// Identity the persisted document is keyed by
    #[serde(default = "default_user")]
    pub user: String,

    /// Directory holding one JSON document per user
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Model id passed to the completion service
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the completion service
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_call_timeout_sec")]
    pub call_timeout_sec: u64,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Coalescing window for background saves
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,

    /// Number of accepted plans kept in history
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Config {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_sec)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    /// Attempts made with one API key before failing over to the next
    #[serde(default = "default_retries_per_credential")]
    pub retries_per_credential: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries_per_credential: default_retries_per_credential(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}
