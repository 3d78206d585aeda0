use crate::error::StoreError;
use crate::model::Credential;
use crate::store::StateManager;
use tracing::{info, warn};

/// API keys kept in the user's document, in insertion order
#[derive(Clone)]
pub struct CredentialPool {
    state: StateManager,
}

impl CredentialPool {
    pub fn new(state: StateManager) -> Self {
        Self { state }
    }

    pub fn list(&self) -> Vec<Credential> {
        self.state.read(|doc| doc.settings.credentials.clone())
    }

    /// Enabled keys in failover order
    pub fn list_enabled(&self) -> Vec<Credential> {
        self.state.read(|doc| {
            doc.settings
                .credentials
                .iter()
                .filter(|c| c.enabled)
                .cloned()
                .collect()
        })
    }

    /// Add a key; returns false if it is already known
    pub async fn add(&self, secret: &str) -> Result<bool, StoreError> {
        let secret = secret.trim();
        if self.find(secret).is_some() {
            return Ok(false);
        }
        self.state
            .commit_now(|doc| doc.settings.credentials.push(Credential::new(secret)))
            .await?;
        info!("Added API key {}", Credential::new(secret).masked());
        Ok(true)
    }

    /// Disable a key and persist before returning; a no-op if already disabled
    pub async fn disable(&self, credential: &Credential) -> Result<bool, StoreError> {
        self.set_enabled(&credential.secret, false).await
    }

    /// Manual reset of a disabled key
    pub async fn enable(&self, secret: &str) -> Result<bool, StoreError> {
        self.set_enabled(secret, true).await
    }

    /// Look a key up; surrounding whitespace is ignored as in `add`
    pub fn find(&self, secret: &str) -> Option<Credential> {
        let secret = secret.trim();
        self.state.read(|doc| {
            doc.settings
                .credentials
                .iter()
                .find(|c| c.secret == secret)
                .cloned()
        })
    }

    async fn set_enabled(&self, secret: &str, enabled: bool) -> Result<bool, StoreError> {
        let secret = secret.trim();
        match self.find(secret) {
            Some(current) if current.enabled != enabled => {}
            _ => return Ok(false),
        }

        self.state
            .commit_now(|doc| {
                for credential in doc
                    .settings
                    .credentials
                    .iter_mut()
                    .filter(|c| c.secret == secret)
                {
                    credential.enabled = enabled;
                }
            })
            .await?;

        let masked = Credential::new(secret).masked();
        if enabled {
            info!("Re-enabled API key {}", masked);
        } else {
            warn!("Disabled API key {}", masked);
        }
        Ok(true)
    }
}
