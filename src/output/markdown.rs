use crate::domain::{JobListing, Recipe};
use crate::model::{
    Aggregate, CommittedPlan, Credential, GenerationCheckpoint, GenerationUnit, Plan, PlanKind,
    ShoppingList, Shortlist,
};

/// Markdown for a draft or committed plan
pub fn render_plan(plan: &Plan, title: &str) -> String {
    let mut md = String::new();
    let kind = plan.request.kind();

    md.push_str(&format!("# {}\n\n", title));
    md.push_str(&format!(
        "**Kind:** {}  \n**Slots:** {}  \n**Units:** {}\n\n",
        kind,
        plan.schedule.slot_count(),
        plan.units.len()
    ));

    md.push_str("## Schedule\n\n");
    for group in &plan.schedule.groups {
        md.push_str(&format!("### {}\n\n", group.name));
        for slot in &group.slots {
            let name = slot
                .unit_id
                .as_ref()
                .and_then(|id| plan.units.get(id))
                .map(|u| u.name.as_str())
                .unwrap_or(slot.unit_name.as_str());
            if slot.carry_over {
                md.push_str(&format!("- **{}**: {} _(leftovers)_\n", slot.key, name));
            } else {
                md.push_str(&format!("- **{}**: {}\n", slot.key, name));
            }
        }
        md.push('\n');
    }

    md.push_str(match kind {
        PlanKind::Meals => "## Recipes\n\n",
        PlanKind::Jobs => "## Openings\n\n",
    });
    for unit in plan.units_in_order() {
        match kind {
            PlanKind::Meals => render_recipe(&mut md, unit),
            PlanKind::Jobs => render_listing(&mut md, unit),
        }
    }

    if let Some(aggregate) = &plan.aggregate {
        if plan.aggregate_stale {
            md.push_str("> Out of date after edits; refresh it to include the latest changes.\n\n");
        }
        match aggregate {
            Aggregate::ShoppingList(list) => render_shopping_list(&mut md, list),
            Aggregate::Shortlist(shortlist) => render_shortlist(&mut md, shortlist),
        }
    }

    md
}

fn render_recipe(md: &mut String, unit: &GenerationUnit) {
    let Ok(recipe) = serde_json::from_value::<Recipe>(unit.payload.clone()) else {
        render_raw(md, unit);
        return;
    };

    md.push_str(&format!("### {}\n\n", unit.name));
    if !recipe.description.is_empty() {
        md.push_str(&format!("{}\n\n", recipe.description));
    }
    md.push_str(&format!(
        "Serves {} · {} min\n\n",
        recipe.servings, recipe.cook_time_minutes
    ));

    md.push_str("**Ingredients**\n\n");
    for ingredient in &recipe.ingredients {
        md.push_str(&format!(
            "- {} {} {}\n",
            format_amount(ingredient.quantity),
            ingredient.unit,
            ingredient.name
        ));
    }

    md.push_str("\n**Steps**\n\n");
    for (i, step) in recipe.steps.iter().enumerate() {
        match step.timer_minutes {
            Some(minutes) => md.push_str(&format!(
                "{}. {} ⏱️ {} min\n",
                i + 1,
                step.description,
                minutes
            )),
            None => md.push_str(&format!("{}. {}\n", i + 1, step.description)),
        }
    }
    md.push('\n');
}

fn render_listing(md: &mut String, unit: &GenerationUnit) {
    let Ok(listing) = serde_json::from_value::<JobListing>(unit.payload.clone()) else {
        render_raw(md, unit);
        return;
    };

    md.push_str(&format!(
        "### {} ({:.0}% match)\n\n",
        unit.name, listing.match_score
    ));
    md.push_str(&format!(
        "**Location:** {}  \n**Salary:** {}\n\n",
        listing.location, listing.salary
    ));
    md.push_str(&format!("{}\n\n", listing.description));
    for requirement in &listing.requirements {
        md.push_str(&format!("- {}\n", requirement));
    }
    md.push_str(&format!("\n_{}_\n\n", listing.match_reasoning));
}

fn render_raw(md: &mut String, unit: &GenerationUnit) {
    md.push_str(&format!("### {}\n\n", unit.name));
    let json = serde_json::to_string_pretty(&unit.payload).unwrap_or_default();
    md.push_str(&format!("```json\n{}\n```\n\n", json));
}

fn render_shopping_list(md: &mut String, list: &ShoppingList) {
    md.push_str("## Shopping list\n\n");
    for category in &list.categories {
        md.push_str(&format!("### {}\n\n", category.name));
        md.push_str("| Item | Needed | Buy | Price |\n");
        md.push_str("|------|--------|-----|-------|\n");
        for item in &category.items {
            md.push_str(&format!(
                "| {} | {} {} | {} {} | {:.2} |\n",
                item.name,
                format_amount(item.quantity),
                item.unit,
                format_amount(item.purchase.quantity),
                item.purchase.unit,
                item.estimated_price
            ));
        }
        md.push('\n');
    }

    md.push_str(&format!("**Estimated total:** {:.2}\n", list.estimated_total));
    if let Some(budget) = list.budget {
        let status = if list.over_budget {
            "⚠️ over budget"
        } else {
            "within budget"
        };
        md.push_str(&format!("**Budget:** {:.2} ({})\n", budget, status));
    }
    md.push('\n');
}

fn render_shortlist(md: &mut String, shortlist: &Shortlist) {
    md.push_str("## Shortlist\n\n");
    md.push_str(&format!("{}\n\n", shortlist.summary));
    for (i, listing) in shortlist.ranked.iter().enumerate() {
        md.push_str(&format!(
            "{}. {} at {} ({:.0}%)\n",
            i + 1,
            listing.title,
            listing.company,
            listing.match_score
        ));
    }
    md.push('\n');
}

fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}

/// One line per accepted plan, newest first, numbered from 1
pub fn render_history(entries: &[CommittedPlan]) -> String {
    if entries.is_empty() {
        return "No accepted plans yet.\n".to_string();
    }

    let mut md = String::new();
    md.push_str("| # | Accepted | Kind | Units |\n");
    md.push_str("|---|----------|------|-------|\n");
    for (i, entry) in entries.iter().enumerate() {
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            entry.accepted_at.format("%Y-%m-%d %H:%M"),
            entry.plan.request.kind(),
            entry.plan.units.len()
        ));
    }
    md
}

pub fn render_credentials(credentials: &[Credential]) -> String {
    if credentials.is_empty() {
        return "No API keys configured.\n".to_string();
    }

    let mut md = String::new();
    for (i, credential) in credentials.iter().enumerate() {
        let status = if credential.enabled { "✅ enabled" } else { "❌ disabled" };
        md.push_str(&format!("{}. {} {}\n", i + 1, credential.masked(), status));
    }
    md
}

/// Status line for an unfinished run
pub fn render_checkpoint(checkpoint: &GenerationCheckpoint) -> String {
    format!(
        "Run {} stopped at {}: {}/{} units done (started {})\n",
        checkpoint.run_id,
        checkpoint.stage,
        checkpoint.completed_count(),
        checkpoint.planned_units.len(),
        checkpoint.started_at.format("%Y-%m-%d %H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Group, PlanRequest, PurchaseSuggestion, Schedule, ShoppingCategory, ShoppingItem, Slot,
    };
    use serde_json::json;
    use std::collections::BTreeMap;

    fn meal_plan() -> Plan {
        let mut plan = Plan {
            request: PlanRequest::Meals(serde_json::from_value(json!({})).unwrap()),
            schedule: Schedule {
                groups: vec![Group {
                    name: "Day 1".into(),
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
            },
            units: BTreeMap::new(),
            aggregate: Some(Aggregate::ShoppingList(ShoppingList {
                categories: vec![ShoppingCategory {
                    name: "Produce".into(),
                    items: vec![ShoppingItem {
                        name: "Carrot".into(),
                        quantity: 250.0,
                        unit: "g".into(),
                        purchase: PurchaseSuggestion {
                            quantity: 0.5,
                            unit: "kg".into(),
                        },
                        estimated_price: 1.25,
                    }],
                }],
                estimated_total: 1.25,
                budget: Some(1.0),
                over_budget: true,
            })),
            aggregate_stale: true,
        };
        plan.insert_unit(
            "Soup",
            json!({
                "name": "Soup",
                "servings": 4,
                "cook_time_minutes": 40,
                "ingredients": [{"name": "Carrot", "quantity": 250, "unit": "g", "category": "Produce"}],
                "steps": [{"description": "Simmer", "timer_minutes": 30}],
            }),
        );
        plan.link_slots();
        plan
    }

    #[test]
    fn test_render_meal_plan() {
        let md = render_plan(&meal_plan(), "Draft");

        assert!(md.starts_with("# Draft\n"));
        assert!(md.contains("- **lunch**: Soup\n"));
        assert!(md.contains("- **dinner**: Soup _(leftovers)_"));
        assert!(md.contains("- 250 g Carrot"));
        assert!(md.contains("1. Simmer ⏱️ 30 min"));
        assert!(md.contains("| Carrot | 250 g | 0.5 kg | 1.25 |"));
        assert!(md.contains("over budget"));
        assert!(md.contains("Out of date"));
    }

    #[test]
    fn test_unreadable_payload_renders_as_json() {
        let mut plan = meal_plan();
        for unit in plan.units.values_mut() {
            unit.payload = json!({"unexpected": true});
        }
        let md = render_plan(&plan, "Draft");
        assert!(md.contains("\"unexpected\": true"));
    }

    #[test]
    fn test_render_credentials_masks_secrets() {
        let mut disabled = Credential::new("AIzaSyDISABLED0000");
        disabled.enabled = false;
        let md = render_credentials(&[Credential::new("AIzaSyABCDEFGH1234"), disabled]);

        assert!(md.contains("1. AIza…1234 ✅ enabled"));
        assert!(md.contains("2. AIza…0000 ❌ disabled"));
        assert!(!md.contains("ABCDEFGH"));
        assert_eq!(render_credentials(&[]), "No API keys configured.\n");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(2.0), "2");
        assert_eq!(format_amount(0.25), "0.25");
        assert_eq!(format_amount(1.5), "1.5");
    }
}
