use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{Aggregate, GenerationUnit, Plan, PlanRequest, Schedule};

/// Pipeline stage; only ever advances
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Planning,
    Detailing,
    Aggregating,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Planning => write!(f, "planning"),
            Stage::Detailing => write!(f, "detailing"),
            Stage::Aggregating => write!(f, "aggregating"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// Resumable state of an in-progress (or finished, unaccepted) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationCheckpoint {
    pub run_id: String,

    pub stage: Stage,

    pub request: PlanRequest,

    pub fingerprint: String,

    #[serde(default)]
    pub schedule: Option<Schedule>,

    #[serde(default)]
    pub planned_units: Vec<String>,

    /// Completed units keyed by id
    #[serde(default)]
    pub completed_units: BTreeMap<String, GenerationUnit>,

    #[serde(default)]
    pub aggregate: Option<Aggregate>,

    #[serde(default)]
    pub aggregate_stale: bool,

    pub started_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl GenerationCheckpoint {
    pub fn new(request: &PlanRequest) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            stage: Stage::Planning,
            request: request.clone(),
            fingerprint: request.fingerprint(),
            schedule: None,
            planned_units: Vec::new(),
            completed_units: BTreeMap::new(),
            aggregate: None,
            aggregate_stale: false,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn is_for(&self, request: &PlanRequest) -> bool {
        self.fingerprint == request.fingerprint()
    }

    /// Move forward to `next`; a backwards move is ignored and reported as false
    pub fn advance(&mut self, next: Stage) -> bool {
        if next < self.stage {
            return false;
        }
        self.stage = next;
        self.updated_at = Utc::now();
        true
    }

    pub fn set_schedule(&mut self, schedule: Schedule) {
        self.planned_units = schedule.planned_units();
        self.schedule = Some(schedule);
        self.advance(Stage::Detailing);
    }

    pub fn unit_named(&self, name: &str) -> Option<&GenerationUnit> {
        self.completed_units.values().find(|u| u.name == name)
    }

    pub fn completed_count(&self) -> usize {
        self.planned_units
            .iter()
            .filter(|name| self.unit_named(name).is_some())
            .count()
    }

    /// Record a finished unit under an id unique within this run
    pub fn record_unit(&mut self, name: &str, payload: serde_json::Value) -> GenerationUnit {
        let id = super::unit_id_for(name, |candidate| {
            self.completed_units.contains_key(candidate)
        });
        let unit = GenerationUnit {
            id: id.clone(),
            name: name.to_string(),
            payload,
        };
        self.completed_units.insert(id, unit.clone());
        self.updated_at = Utc::now();
        unit
    }

    pub fn finish(&mut self, aggregate: Option<Aggregate>) {
        self.advance(Stage::Done);
        self.aggregate = aggregate;
        self.aggregate_stale = false;
    }

    /// The finished plan, once the run reached `Done`
    pub fn draft(&self) -> Option<Plan> {
        if self.stage != Stage::Done {
            return None;
        }
        Some(self.snapshot())
    }

    /// Plan built from whatever has been recorded so far
    pub fn snapshot(&self) -> Plan {
        let mut plan = Plan {
            request: self.request.clone(),
            schedule: self.schedule.clone().unwrap_or_default(),
            units: self.completed_units.clone(),
            aggregate: self.aggregate.clone(),
            aggregate_stale: self.aggregate_stale,
        };
        plan.link_slots();
        plan
    }

    /// Store an edited draft back; only valid once the run is `Done`
    pub fn replace_draft(&mut self, plan: Plan) -> bool {
        if self.stage != Stage::Done {
            return false;
        }
        self.planned_units = plan.schedule.planned_units();
        self.schedule = Some(plan.schedule);
        self.completed_units = plan.units;
        self.aggregate = plan.aggregate;
        self.aggregate_stale = plan.aggregate_stale;
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Group, Slot};
    use serde_json::json;

    fn request() -> PlanRequest {
        serde_json::from_value(json!({"kind": "meals", "preferences": "no fish"})).unwrap()
    }

    fn schedule() -> Schedule {
        Schedule {
            groups: vec![Group {
                name: "Monday".into(),
                slots: vec![
                    Slot {
                        key: "lunch".into(),
                        unit_name: "Soup".into(),
                        carry_over: false,
                        unit_id: None,
                    },
                    Slot {
                        key: "dinner".into(),
                        unit_name: "Soup".into(),
                        carry_over: true,
                        unit_id: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn test_stage_only_advances() {
        let mut checkpoint = GenerationCheckpoint::new(&request());
        assert!(checkpoint.advance(Stage::Aggregating));
        assert!(!checkpoint.advance(Stage::Detailing));
        assert_eq!(checkpoint.stage, Stage::Aggregating);
    }

    #[test]
    fn test_draft_only_when_done() {
        let mut checkpoint = GenerationCheckpoint::new(&request());
        checkpoint.set_schedule(schedule());
        assert_eq!(checkpoint.stage, Stage::Detailing);
        assert_eq!(checkpoint.planned_units, vec!["Soup"]);

        checkpoint.record_unit("Soup", json!({"steps": []}));
        assert_eq!(checkpoint.completed_count(), 1);
        assert!(checkpoint.draft().is_none());

        checkpoint.finish(None);
        let draft = checkpoint.draft().unwrap();
        assert_eq!(draft.unit_for_slot("Monday", "dinner").unwrap().name, "Soup");
    }

    #[test]
    fn test_record_unit_ids_are_unique() {
        let mut checkpoint = GenerationCheckpoint::new(&request());
        let a = checkpoint.record_unit("Soup", json!(1));
        let b = checkpoint.record_unit("soup", json!(2));
        assert_ne!(a.id, b.id);
        assert_eq!(checkpoint.completed_units.len(), 2);
    }

    #[test]
    fn test_fingerprint_match() {
        let checkpoint = GenerationCheckpoint::new(&request());
        assert!(checkpoint.is_for(&request()));
        let other: PlanRequest = serde_json::from_value(json!({"kind": "meals"})).unwrap();
        assert!(!checkpoint.is_for(&other));
    }
}
