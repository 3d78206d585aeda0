//! Structured completion calls with per-key retry and key failover
//!
//! Every call walks the enabled keys in order. Each key gets a bounded
//! number of attempts with capped exponential backoff; a key the service
//! rejects is disabled (and persisted) before moving to the next one.

mod parse;
mod retry;
mod schema;

pub use parse::{extract_json, parse_structured};
pub use retry::{backoff_delay, retry_with_backoff};
pub use schema::output_schema;

use crate::config::{Config, RetryConfig};
use crate::credentials::CredentialPool;
use crate::error::{CallFailure, CompletionError, ServiceError};
use crate::model::Credential;
use crate::provider::{
    CompletionService, ErrorClassifier, FailureClass, PhraseClassifier, ServiceFactory,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A response type the service must produce
pub trait StructuredOutput: DeserializeOwned + JsonSchema + Send {
    /// Content checks the schema cannot express
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Reply to the key validation probe
#[derive(Debug, Deserialize, JsonSchema)]
struct ProbeReply {
    ok: bool,
}

impl StructuredOutput for ProbeReply {}

const PROBE_PROMPT: &str = r#"Reply with the JSON object {"ok": true} and nothing else."#;

pub struct CompletionClient {
    pool: CredentialPool,
    factory: Arc<dyn ServiceFactory>,
    classifier: Arc<dyn ErrorClassifier>,
    model: String,
    retry: RetryConfig,
    call_timeout: Duration,
}

impl CompletionClient {
    pub fn new(pool: CredentialPool, factory: Arc<dyn ServiceFactory>, config: &Config) -> Self {
        Self {
            pool,
            factory,
            classifier: Arc::new(PhraseClassifier::default()),
            model: config.model.clone(),
            retry: config.retry.clone(),
            call_timeout: config.call_timeout(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Run `prompt` and decode the reply as `T`
    ///
    /// `label` names the call in logs and errors, e.g. "recipe: Lentil soup".
    pub async fn complete<T: StructuredOutput>(
        &self,
        prompt: &str,
        label: &str,
    ) -> Result<T, CompletionError> {
        let credentials = self.pool.list_enabled();
        if credentials.is_empty() {
            return Err(CompletionError::NoCredentialsAvailable);
        }

        let schema = output_schema::<T>();
        let total = credentials.len();
        let mut attempts = 0u32;
        let mut last = None;

        for (index, credential) in credentials.iter().enumerate() {
            let key_no = index + 1;
            let service = self.factory.connect(credential);

            let result = retry_with_backoff(&self.retry, CallFailure::is_retryable, |attempt| {
                attempts += 1;
                debug!(
                    "[{}] attempt {} with key #{}/{} ({})",
                    label,
                    attempt,
                    key_no,
                    total,
                    credential.masked()
                );
                self.attempt::<T>(service.as_ref(), prompt, &schema)
            })
            .await;

            match result {
                Ok(value) => {
                    info!("[{}] completed with key #{} via {}", label, key_no, service.name());
                    return Ok(value);
                }
                Err(failure @ CallFailure::Rejected(_)) => {
                    warn!("[{}] request rejected: {}", label, failure);
                    return Err(CompletionError::Rejected {
                        label: label.to_string(),
                        failure,
                    });
                }
                Err(failure @ CallFailure::CredentialInvalid(_)) => {
                    warn!("[{}] key #{} is not usable: {}", label, key_no, failure);
                    self.pool.disable(credential).await?;
                    last = Some(failure);
                }
                Err(failure) => {
                    warn!("[{}] key #{} gave up: {}", label, key_no, failure);
                    last = Some(failure);
                }
            }
        }

        Err(CompletionError::AllCredentialsExhausted {
            label: label.to_string(),
            attempts,
            last: last.unwrap_or_else(|| CallFailure::Transient("no attempt made".to_string())),
        })
    }

    /// One call with `credential` to check it works; nothing is disabled
    pub async fn probe(&self, credential: &Credential) -> Result<(), CallFailure> {
        let service = self.factory.connect(credential);
        let schema = output_schema::<ProbeReply>();
        let reply: ProbeReply = self.attempt(service.as_ref(), PROBE_PROMPT, &schema).await?;
        if !reply.ok {
            debug!("Probe answered ok=false; the key still works");
        }
        Ok(())
    }

    async fn attempt<T: StructuredOutput>(
        &self,
        service: &dyn CompletionService,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<T, CallFailure> {
        let raw = match timeout(self.call_timeout, service.generate(&self.model, prompt, schema)).await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.call_timeout)),
        }
        .map_err(|e| self.classify(e))?;

        parse_structured(&raw).map_err(CallFailure::MalformedResponse)
    }

    fn classify(&self, error: ServiceError) -> CallFailure {
        let message = error.to_string();
        match self.classifier.classify(&error) {
            FailureClass::Credential => CallFailure::CredentialInvalid(message),
            FailureClass::Transient => CallFailure::Transient(message),
            FailureClass::Fatal => CallFailure::Rejected(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ScriptedFactory};
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Answer {
        value: u32,
    }

    impl StructuredOutput for Answer {}

    fn auth_error() -> ServiceError {
        ServiceError::Api {
            status: 400,
            message: "INVALID_ARGUMENT: API key not valid. Please pass a valid API key.".into(),
        }
    }

    fn overloaded() -> ServiceError {
        ServiceError::Api {
            status: 503,
            message: "UNAVAILABLE: The model is overloaded.".into(),
        }
    }

    #[tokio::test]
    async fn test_fails_over_and_disables_bad_keys_once() {
        let factory = ScriptedFactory::new(|call| match call.secret.as_str() {
            "key-1" | "key-2" => Err(auth_error()),
            _ => Ok(json!({"value": 7}).to_string()),
        });
        let h = testing::harness(&["key-1", "key-2", "key-3"], factory.clone()).await;
        let writes = h.store.write_count();

        let answer: Answer = h.client.complete("q", "answer").await.unwrap();
        assert_eq!(answer.value, 7);

        // Credential errors are never retried with the same key
        assert_eq!(factory.calls_for("key-1"), 1);
        assert_eq!(factory.calls_for("key-2"), 1);
        assert_eq!(factory.calls_for("key-3"), 1);

        let enabled: Vec<_> = h.pool.list_enabled().into_iter().map(|c| c.secret).collect();
        assert_eq!(enabled, vec!["key-3"]);
        assert_eq!(h.store.write_count(), writes + 2);

        let stored = h.store.stored("tester").unwrap();
        assert!(!stored.settings.credentials[0].enabled);
        assert!(!stored.settings.credentials[1].enabled);
    }

    #[tokio::test]
    async fn test_exhaustion_disables_every_key() {
        let factory = ScriptedFactory::new(|_| Err(auth_error()));
        let h = testing::harness(&["key-1", "key-2"], factory.clone()).await;

        let err = h.client.complete::<Answer>("q", "answer").await.unwrap_err();
        match err {
            CompletionError::AllCredentialsExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(last, CallFailure::CredentialInvalid(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(h.pool.list_enabled().is_empty());

        let again = h.client.complete::<Answer>("q", "answer").await.unwrap_err();
        assert!(matches!(again, CompletionError::NoCredentialsAvailable));
        assert_eq!(factory.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_transient_errors_retry_same_key() {
        let factory = ScriptedFactory::new(|call| {
            if call.attempt < 3 {
                Err(overloaded())
            } else {
                Ok(r#"```json
{"value": 1}
```"#
                    .to_string())
            }
        });
        let h = testing::harness(&["key-1", "key-2"], factory.clone()).await;

        let answer: Answer = h.client.complete("q", "answer").await.unwrap();
        assert_eq!(answer.value, 1);
        assert_eq!(factory.calls_for("key-1"), 3);
        assert_eq!(factory.calls_for("key-2"), 0);
        assert_eq!(h.pool.list_enabled().len(), 2);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_keeps_the_key() {
        let factory = ScriptedFactory::new(|call| {
            if call.attempt == 1 {
                Err(ServiceError::Api {
                    status: 429,
                    message: "RESOURCE_EXHAUSTED: You exceeded your current quota, please check your plan and billing details.".into(),
                })
            } else {
                Ok(json!({"value": 3}).to_string())
            }
        });
        let h = testing::harness(&["key-1"], factory.clone()).await;

        let answer: Answer = h.client.complete("q", "answer").await.unwrap();
        assert_eq!(answer.value, 3);
        assert_eq!(factory.calls_for("key-1"), 2);
        assert_eq!(h.pool.list_enabled().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_replies_exhaust_without_disabling() {
        let factory = ScriptedFactory::new(|_| Ok("not json at all".to_string()));
        let h = testing::harness(&["key-1", "key-2"], factory.clone()).await;

        let err = h.client.complete::<Answer>("q", "answer").await.unwrap_err();
        match err {
            CompletionError::AllCredentialsExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 6);
                assert!(matches!(last, CallFailure::MalformedResponse(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.pool.list_enabled().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_request_stops_immediately() {
        let factory = ScriptedFactory::new(|_| {
            Err(ServiceError::Api {
                status: 400,
                message: "INVALID_ARGUMENT: Request contains an invalid argument.".into(),
            })
        });
        let h = testing::harness(&["key-1", "key-2"], factory.clone()).await;

        let err = h.client.complete::<Answer>("q", "answer").await.unwrap_err();
        assert!(matches!(err, CompletionError::Rejected { .. }));
        assert_eq!(factory.calls().len(), 1);
        assert_eq!(h.pool.list_enabled().len(), 2);
    }

    #[tokio::test]
    async fn test_slow_call_times_out_as_transient() {
        let factory = ScriptedFactory::delayed(Duration::from_millis(200), |_| {
            Ok(json!({"value": 1}).to_string())
        });
        let h = testing::harness_with(&["key-1"], factory.clone(), |config| {
            config.call_timeout_sec = 0;
        })
        .await;

        let err = h.client.complete::<Answer>("q", "answer").await.unwrap_err();
        match err {
            CompletionError::AllCredentialsExhausted { last, .. } => {
                assert!(matches!(last, CallFailure::Transient(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_probe_reports_failure_without_disabling() {
        let factory = ScriptedFactory::new(|call| match call.secret.as_str() {
            "good" => Ok(r#"{"ok": true}"#.to_string()),
            _ => Err(auth_error()),
        });
        let h = testing::harness(&["good"], factory).await;

        assert!(h.client.probe(&Credential::new("good")).await.is_ok());
        let failure = h.client.probe(&Credential::new("bad")).await.unwrap_err();
        assert!(matches!(failure, CallFailure::CredentialInvalid(_)));
        assert_eq!(h.pool.list_enabled().len(), 1);
    }
}
