//! Scoped regeneration of one slot or one group of an existing plan
//!
//! The service sees the whole plan as context but only the targeted part
//! is taken from its answer. Everything else is copied from the original,
//! so an edit can never disturb other groups. Failures leave the input
//! plan as it was.

use crate::completion::CompletionClient;
use crate::domain::domain_for;
use crate::error::EditError;
use crate::model::{GenerationUnit, Group, Plan, Slot};
use std::sync::Arc;
use tracing::info;

/// Which copy of the plan an edit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTarget {
    /// The finished, unaccepted draft
    Draft,
    /// The accepted plan
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSelector {
    pub group: String,
    pub slot: String,
}

impl UnitSelector {
    pub fn new(group: impl Into<String>, slot: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            slot: slot.into(),
        }
    }
}

/// An edited plan plus the units the edit created
#[derive(Debug, Clone)]
pub struct Edit {
    pub plan: Plan,
    pub new_units: Vec<GenerationUnit>,
}

pub struct PlanEditor {
    client: Arc<CompletionClient>,
}

impl PlanEditor {
    pub fn new(client: Arc<CompletionClient>) -> Self {
        Self { client }
    }

    /// Replace the unit in one slot; other slots sharing the old unit keep it
    pub async fn regenerate_unit(
        &self,
        plan: &Plan,
        selector: &UnitSelector,
        hint: &str,
    ) -> Result<Edit, EditError> {
        let (group_index, slot_index) = locate(plan, selector)?;

        let domain = domain_for(&plan.request);
        let draft = domain
            .revise_unit(&self.client, plan, &selector.group, &selector.slot, hint)
            .await?;

        info!(
            "Replacing {} / {} with '{}'",
            selector.group, selector.slot, draft.name
        );

        let mut updated = plan.clone();
        let id = updated.insert_unit(&draft.name, draft.payload);
        let slot = &mut updated.schedule.groups[group_index].slots[slot_index];
        slot.unit_name = draft.name;
        slot.unit_id = Some(id.clone());
        slot.carry_over = false;

        updated.prune_orphans();
        updated.aggregate_stale = updated.aggregate.is_some();

        let new_units = updated.units.get(&id).cloned().into_iter().collect();
        Ok(Edit {
            plan: updated,
            new_units,
        })
    }

    /// Replace every slot of one group
    pub async fn regenerate_group(
        &self,
        plan: &Plan,
        group: &str,
        hint: &str,
    ) -> Result<Edit, EditError> {
        let group_index = plan
            .schedule
            .groups
            .iter()
            .position(|g| g.name == group)
            .ok_or_else(|| EditError::UnknownGroup(group.to_string()))?;

        let domain = domain_for(&plan.request);
        let revised = domain
            .revise_group(&self.client, plan, group, hint)
            .await?;
        if revised.is_empty() {
            return Err(EditError::EmptyGroup(group.to_string()));
        }

        let mut updated = plan.clone();
        let mut new_units = Vec::new();
        let mut slots = Vec::with_capacity(revised.len());

        for revised_slot in revised {
            let (unit_id, carry_over) = match revised_slot.payload {
                Some(payload) => {
                    let id = updated.insert_unit(&revised_slot.unit_name, payload);
                    new_units.extend(updated.units.get(&id).cloned());
                    (Some(id), false)
                }
                None => {
                    let existing = updated
                        .unit_by_name(&revised_slot.unit_name)
                        .map(|u| u.id.clone());
                    (existing, revised_slot.carry_over)
                }
            };
            if unit_id.is_none() {
                continue;
            }
            slots.push(Slot {
                key: revised_slot.key,
                unit_name: revised_slot.unit_name,
                carry_over,
                unit_id,
            });
        }

        if slots.is_empty() {
            return Err(EditError::EmptyGroup(group.to_string()));
        }

        // The group keeps its name and position whatever the service called it
        updated.schedule.groups[group_index] = Group {
            name: plan.schedule.groups[group_index].name.clone(),
            slots,
        };
        updated.prune_orphans();
        updated.aggregate_stale = updated.aggregate.is_some();

        info!("Regenerated {} ({} new units)", group, new_units.len());
        Ok(Edit {
            plan: updated,
            new_units,
        })
    }

    /// Rebuild the aggregate from the plan's current units
    pub async fn refresh_aggregate(&self, plan: &Plan) -> Result<Plan, EditError> {
        let domain = domain_for(&plan.request);
        let aggregate = domain.aggregate(&self.client, plan).await?;

        let mut updated = plan.clone();
        updated.aggregate = aggregate;
        updated.aggregate_stale = false;
        Ok(updated)
    }
}

fn locate(plan: &Plan, selector: &UnitSelector) -> Result<(usize, usize), EditError> {
    let group_index = plan
        .schedule
        .groups
        .iter()
        .position(|g| g.name == selector.group)
        .ok_or_else(|| EditError::UnknownGroup(selector.group.clone()))?;

    let slot_index = plan.schedule.groups[group_index]
        .slots
        .iter()
        .position(|s| s.key == selector.slot)
        .ok_or_else(|| EditError::UnknownSlot {
            group: selector.group.clone(),
            slot: selector.slot.clone(),
        })?;

    Ok((group_index, slot_index))
}
