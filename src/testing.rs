//! Scripted completion backend and wiring shared by unit tests

use crate::completion::CompletionClient;
use crate::config::{Config, RetryConfig};
use crate::credentials::CredentialPool;
use crate::error::ServiceError;
use crate::model::Credential;
use crate::provider::{CompletionService, ServiceFactory};
use crate::store::{MemoryDocumentStore, StateManager};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded `generate` call
#[derive(Debug, Clone)]
pub struct Call {
    pub secret: String,
    pub prompt: String,
    /// 1-based count of calls made with this secret so far
    pub attempt: u32,
}

type Responder = dyn Fn(&Call) -> Result<String, ServiceError> + Send + Sync;

pub struct ScriptedFactory {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<Call>>>,
    delay: Option<Duration>,
}

impl ScriptedFactory {
    pub fn new(
        responder: impl Fn(&Call) -> Result<String, ServiceError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Arc::new(responder),
            calls: Arc::default(),
            delay: None,
        })
    }

    pub fn delayed(
        delay: Duration,
        responder: impl Fn(&Call) -> Result<String, ServiceError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Arc::new(responder),
            calls: Arc::default(),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, secret: &str) -> usize {
        self.calls().iter().filter(|c| c.secret == secret).count()
    }

    /// Calls whose prompt contains `needle`
    pub fn calls_mentioning(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.prompt.contains(needle)).count()
    }
}

impl ServiceFactory for ScriptedFactory {
    fn connect(&self, credential: &Credential) -> Arc<dyn CompletionService> {
        Arc::new(ScriptedService {
            secret: credential.secret.clone(),
            responder: self.responder.clone(),
            calls: self.calls.clone(),
            delay: self.delay,
        })
    }
}

struct ScriptedService {
    secret: String,
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<Call>>>,
    delay: Option<Duration>,
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<String, ServiceError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let attempt = calls.iter().filter(|c| c.secret == self.secret).count() as u32 + 1;
            let call = Call {
                secret: self.secret.clone(),
                prompt: prompt.to_string(),
                attempt,
            };
            calls.push(call.clone());
            call
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(&call)
    }
}

pub struct Harness {
    pub store: Arc<MemoryDocumentStore>,
    pub state: StateManager,
    pub pool: CredentialPool,
    pub client: Arc<CompletionClient>,
    pub config: Config,
}

pub fn test_config() -> Config {
    Config {
        user: "tester".to_string(),
        retry: RetryConfig {
            retries_per_credential: 3,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        },
        save_debounce_ms: 10_000,
        ..Config::default()
    }
}

pub async fn harness(secrets: &[&str], factory: Arc<ScriptedFactory>) -> Harness {
    harness_with(secrets, factory, |_| {}).await
}

pub async fn harness_with(
    secrets: &[&str],
    factory: Arc<ScriptedFactory>,
    tweak: impl FnOnce(&mut Config),
) -> Harness {
    let mut config = test_config();
    tweak(&mut config);

    let store = Arc::new(MemoryDocumentStore::new());
    let (state, _) = StateManager::connect(store.clone(), &config.user, config.save_debounce())
        .await
        .unwrap();
    let pool = CredentialPool::new(state.clone());
    for secret in secrets {
        pool.add(secret).await.unwrap();
    }
    let client = Arc::new(CompletionClient::new(pool.clone(), factory, &config));

    Harness {
        store,
        state,
        pool,
        client,
        config,
    }
}
