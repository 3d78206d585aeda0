use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{GenerationCheckpoint, GenerationUnit, Plan, PlanRequest};

/// An API key for the completion service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub secret: String,

    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            enabled: true,
        }
    }

    /// Key shortened for logs and listings
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.secret.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("secret", &self.masked())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub credentials: Vec<Credential>,

    #[serde(default)]
    pub profile: Option<PlanRequest>,
}

/// An accepted plan, current or in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedPlan {
    pub id: String,
    pub plan: Plan,
    pub accepted_at: DateTime<Utc>,
}

impl CommittedPlan {
    pub fn new(plan: Plan) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            plan,
            accepted_at: Utc::now(),
        }
    }
}

/// Everything persisted for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub checkpoint: Option<GenerationCheckpoint>,

    #[serde(default)]
    pub committed: Option<CommittedPlan>,

    /// Accepted plans, newest first
    #[serde(default)]
    pub history: Vec<CommittedPlan>,

    /// Previously generated units keyed by display name
    #[serde(default)]
    pub unit_cache: BTreeMap<String, GenerationUnit>,

    #[serde(default)]
    pub revision: u64,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Some(Utc::now());
    }

    /// The finished, not yet accepted plan
    pub fn draft(&self) -> Option<Plan> {
        self.checkpoint.as_ref().and_then(|c| c.draft())
    }

    /// Make `plan` the committed plan and push it on the bounded history
    pub fn commit(&mut self, plan: Plan, history_limit: usize) -> CommittedPlan {
        let committed = CommittedPlan::new(plan);
        self.history.insert(0, committed.clone());
        self.history.truncate(history_limit);
        self.committed = Some(committed.clone());
        self.checkpoint = None;
        committed
    }
}
