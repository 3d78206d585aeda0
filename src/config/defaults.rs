use std::path::PathBuf;

pub fn default_user() -> String {
    "default".to_string()
}

pub fn default_store_dir() -> PathBuf {
    PathBuf::from(".plansmith")
}

pub fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

pub fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

pub fn default_call_timeout_sec() -> u64 {
    120
}

pub fn default_retries_per_credential() -> u32 {
    3
}

pub fn default_backoff_base_ms() -> u64 {
    1500
}

pub fn default_backoff_max_ms() -> u64 {
    6000
}

pub fn default_save_debounce_ms() -> u64 {
    1000
}

pub fn default_history_limit() -> usize {
    5
}
