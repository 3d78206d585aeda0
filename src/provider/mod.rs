mod classifier;
mod gemini;

pub use classifier::{ErrorClassifier, FailureClass, PhraseClassifier};
pub use gemini::{GeminiFactory, GeminiService};

use crate::error::ServiceError;
use crate::model::Credential;
use async_trait::async_trait;
use std::sync::Arc;

/// A completion backend bound to one credential
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw response text for `prompt`, asked to follow `schema` (JSON Schema)
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<String, ServiceError>;
}

/// Builds a fresh service value per credential; nothing is cached between calls
pub trait ServiceFactory: Send + Sync {
    fn connect(&self, credential: &Credential) -> Arc<dyn CompletionService>;
}
