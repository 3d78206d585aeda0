//! The two plan kinds: their prompts, response shapes and local folding

mod jobs;
mod meals;

pub use jobs::{suggest_platforms, JobListing, JobScout, PlannedListing};
pub use meals::{round_purchase, Ingredient, MealPlanner, Recipe, RecipeStep};

use crate::completion::CompletionClient;
use crate::error::CompletionError;
use crate::model::{Aggregate, Plan, PlanKind, PlanRequest, Schedule};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A freshly generated unit before it gets an id
#[derive(Debug, Clone, PartialEq)]
pub struct UnitDraft {
    pub name: String,
    pub payload: Value,
}

/// One slot of a regenerated group
#[derive(Debug, Clone, PartialEq)]
pub struct RevisedSlot {
    pub key: String,
    pub unit_name: String,
    pub carry_over: bool,
    /// Absent for carry-over slots, which reuse an existing unit
    pub payload: Option<Value>,
}

/// What one plan kind asks the service at each stage
#[async_trait]
pub trait PlanDomain: Send + Sync {
    fn kind(&self) -> PlanKind;

    /// Lay out groups and slots, naming the unit each slot needs
    async fn plan(&self, client: &CompletionClient) -> Result<Schedule, CompletionError>;

    /// Full payload for one planned unit
    async fn detail(&self, client: &CompletionClient, unit_name: &str)
        -> Result<Value, CompletionError>;

    async fn aggregate(
        &self,
        client: &CompletionClient,
        plan: &Plan,
    ) -> Result<Option<Aggregate>, CompletionError>;

    /// Replacement unit for one slot, with the whole plan as context
    async fn revise_unit(
        &self,
        client: &CompletionClient,
        plan: &Plan,
        group: &str,
        slot: &str,
        hint: &str,
    ) -> Result<UnitDraft, CompletionError>;

    /// Replacement slots for one group, with the whole plan as context
    async fn revise_group(
        &self,
        client: &CompletionClient,
        plan: &Plan,
        group: &str,
        hint: &str,
    ) -> Result<Vec<RevisedSlot>, CompletionError>;
}

pub fn domain_for(request: &PlanRequest) -> Box<dyn PlanDomain> {
    match request {
        PlanRequest::Meals(profile) => Box::new(MealPlanner::new(profile.clone())),
        PlanRequest::Jobs(profile) => Box::new(JobScout::new(profile.clone())),
    }
}

/// Payload stored for a unit
pub(crate) fn to_payload<T: Serialize>(value: &T) -> Value {
    // Derived Serialize impls with string keys cannot fail
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn or_unspecified(text: &str) -> &str {
    if text.trim().is_empty() {
        "not specified"
    } else {
        text.trim()
    }
}

fn hint_or_default(hint: &str) -> &str {
    if hint.trim().is_empty() {
        "No specific wishes; just offer something different."
    } else {
        hint.trim()
    }
}
