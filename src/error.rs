use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::model::Stage;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Raw failure reported by a completion-service backend
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Empty response: {0}")]
    EmptyResponse(String),
}

/// A single failed attempt, after classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    #[error("credential rejected: {0}")]
    CredentialInvalid(String),

    #[error("transient service error: {0}")]
    Transient(String),

    #[error("response did not match the declared schema: {0}")]
    MalformedResponse(String),

    #[error("request rejected by the service: {0}")]
    Rejected(String),
}

impl CallFailure {
    /// Whether another attempt with the same credential may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CallFailure::Transient(_) | CallFailure::MalformedResponse(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("No enabled API keys; add a key or re-enable a disabled one")]
    NoCredentialsAvailable,

    #[error("[{label}] all API keys exhausted after {attempts} attempts; last error: {last}")]
    AllCredentialsExhausted {
        label: String,
        attempts: u32,
        last: CallFailure,
    },

    #[error("[{label}] {failure}")]
    Rejected { label: String, failure: CallFailure },

    #[error("Failed to persist credential change: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read document '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write document '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Document serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Background writer stopped")]
    WriterClosed,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("The planning stage produced no units")]
    EmptyPlan,

    #[error("No enabled API keys; add a key or re-enable a disabled one")]
    NoCredentialsAvailable,

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: CompletionError,
    },

    #[error("Failed to generate '{unit}': {source}")]
    UnitGenerationFailed {
        unit: String,
        #[source]
        source: CompletionError,
    },

    #[error("Checkpoint write failed: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub(crate) fn at_stage(stage: Stage, source: CompletionError) -> Self {
        match source {
            CompletionError::NoCredentialsAvailable => PipelineError::NoCredentialsAvailable,
            CompletionError::Store(e) => PipelineError::Store(e),
            source => PipelineError::StageFailed { stage, source },
        }
    }

    pub(crate) fn for_unit(unit: &str, source: CompletionError) -> Self {
        match source {
            CompletionError::NoCredentialsAvailable => PipelineError::NoCredentialsAvailable,
            CompletionError::Store(e) => PipelineError::Store(e),
            source => PipelineError::UnitGenerationFailed {
                unit: unit.to_string(),
                source,
            },
        }
    }

    /// The stage the run stopped in, if the error is tied to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::EmptyPlan => Some(Stage::Planning),
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            PipelineError::UnitGenerationFailed { .. } => Some(Stage::Detailing),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("No group named '{0}' in the plan")]
    UnknownGroup(String),

    #[error("No slot '{slot}' in group '{group}'")]
    UnknownSlot { group: String, slot: String },

    #[error("Regeneration returned no slots for group '{0}'")]
    EmptyGroup(String),

    #[error("Regeneration failed: {0}")]
    Completion(#[from] CompletionError),
}

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("There is no draft to accept; run a generation first")]
    NoDraft,

    #[error("The draft changed since it was shown; review it again before accepting")]
    StaleDraft,

    #[error("There is no committed plan yet")]
    NoCommittedPlan,

    #[error("No plan profile configured")]
    NoProfile,

    #[error("The stored profile is not a job search")]
    NotJobSearch,

    #[error("History entry {index} does not exist ({len} entries)")]
    HistoryIndex { index: usize, len: usize },

    #[error("API key is empty")]
    EmptyCredential,

    #[error("Unknown API key")]
    UnknownCredential,

    #[error("API key check failed: {0}")]
    CredentialCheck(CallFailure),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
