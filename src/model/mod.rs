//! Persisted data model: plan requests, plans, checkpoints and the per-user document

mod aggregate;
mod checkpoint;
mod document;
mod plan;
mod request;

pub use aggregate::{
    Aggregate, PurchaseSuggestion, RankedListing, ShoppingCategory, ShoppingItem, ShoppingList,
    Shortlist,
};
pub use checkpoint::{GenerationCheckpoint, Stage};
pub use document::{CommittedPlan, Credential, Document, Settings};
pub use plan::{unit_id_for, GenerationUnit, Group, Plan, Schedule, Slot};
pub use request::{CareerProfile, FamilyMember, FamilyProfile, PlanKind, PlanRequest};
