use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{Aggregate, PlanRequest};

/// One generated item: a recipe or a job listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationUnit {
    pub id: String,
    pub name: String,
    pub payload: serde_json::Value,
}

/// A position in the schedule that a unit fills (a meal of a day, a listing)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub key: String,

    pub unit_name: String,

    /// Reuses a unit produced for another slot; never detailed on its own
    #[serde(default)]
    pub carry_over: bool,

    #[serde(default)]
    pub unit_id: Option<String>,
}

/// A named subgroup of slots, e.g. one day of a meal plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub slots: Vec<Slot>,
}

impl Group {
    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.key == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub groups: Vec<Group>,
}

impl Schedule {
    /// Distinct unit names that need detailing, in first-seen order
    pub fn planned_units(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.slots.iter())
            .filter(|s| !s.carry_over)
            .map(|s| s.unit_name.trim())
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect()
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn slot_count(&self) -> usize {
        self.groups.iter().map(|g| g.slots.len()).sum()
    }
}

/// A complete plan: a draft awaiting review or the accepted plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub request: PlanRequest,

    pub schedule: Schedule,

    /// Units keyed by id
    pub units: BTreeMap<String, GenerationUnit>,

    #[serde(default)]
    pub aggregate: Option<Aggregate>,

    /// Set when a scoped edit changed units after the aggregate was built
    #[serde(default)]
    pub aggregate_stale: bool,
}

impl Plan {
    pub fn unit_for_slot(&self, group: &str, slot: &str) -> Option<&GenerationUnit> {
        let slot = self.schedule.group(group)?.slot(slot)?;
        slot.unit_id.as_ref().and_then(|id| self.units.get(id))
    }

    pub fn unit_by_name(&self, name: &str) -> Option<&GenerationUnit> {
        self.units.values().find(|u| u.name == name)
    }

    /// Units in schedule order, each once
    pub fn units_in_order(&self) -> Vec<&GenerationUnit> {
        let mut seen = BTreeSet::new();
        self.schedule
            .groups
            .iter()
            .flat_map(|g| g.slots.iter())
            .filter_map(|s| s.unit_id.as_deref())
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.units.get(id))
            .collect()
    }

    /// Point every unlinked slot at the unit carrying its name
    pub fn link_slots(&mut self) {
        let by_name: BTreeMap<String, String> = self
            .units
            .values()
            .map(|u| (u.name.clone(), u.id.clone()))
            .collect();

        for slot in self.schedule.groups.iter_mut().flat_map(|g| g.slots.iter_mut()) {
            let linked = slot
                .unit_id
                .as_ref()
                .map(|id| self.units.contains_key(id))
                .unwrap_or(false);
            if !linked {
                slot.unit_id = by_name.get(slot.unit_name.trim()).cloned();
            }
        }
    }

    /// Drop units no slot refers to any more
    pub fn prune_orphans(&mut self) {
        let referenced: BTreeSet<String> = self
            .schedule
            .groups
            .iter()
            .flat_map(|g| g.slots.iter())
            .filter_map(|s| s.unit_id.clone())
            .collect();
        self.units.retain(|id, _| referenced.contains(id));
    }

    /// Insert a unit under a fresh id derived from its name
    pub fn insert_unit(&mut self, name: &str, payload: serde_json::Value) -> String {
        let id = unit_id_for(name, |candidate| self.units.contains_key(candidate));
        self.units.insert(
            id.clone(),
            GenerationUnit {
                id: id.clone(),
                name: name.to_string(),
                payload,
            },
        );
        id
    }
}

/// Derive a unit id from its name, suffixing on collision
pub fn unit_id_for(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut slug = String::new();
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    let base = if slug.is_empty() { "unit" } else { slug };

    if !taken(base) {
        return base.to_string();
    }

    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
