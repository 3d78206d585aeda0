//! Weekly meal plans: days of meals, a recipe per dish, one shopping list

use super::{hint_or_default, or_unspecified, to_payload, PlanDomain, RevisedSlot, UnitDraft};
use crate::completion::{CompletionClient, StructuredOutput};
use crate::error::CompletionError;
use crate::model::{
    Aggregate, FamilyProfile, Group, Plan, PlanKind, PurchaseSuggestion, Schedule,
    ShoppingCategory, ShoppingItem, ShoppingList, Slot,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

const PLAN_PROMPT: &str = include_str!("../../prompts/meals/plan.md");
const RECIPE_PROMPT: &str = include_str!("../../prompts/meals/recipe.md");
const SHOPPING_PROMPT: &str = include_str!("../../prompts/meals/shopping.md");
const REVISE_MEAL_PROMPT: &str = include_str!("../../prompts/meals/revise_meal.md");
const REVISE_DAY_PROMPT: &str = include_str!("../../prompts/meals/revise_day.md");

#[derive(Debug, Deserialize, JsonSchema)]
struct Menu {
    days: Vec<MenuDay>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MenuDay {
    day: String,
    meals: Vec<MenuMeal>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MenuMeal {
    /// breakfast, lunch, dinner or snack
    meal: String,
    dish: String,
    /// Serves a dish cooked earlier in the week again
    #[serde(default)]
    leftover: bool,
}

impl StructuredOutput for Menu {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub servings: u32,
    pub cook_time_minutes: u32,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<RecipeStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    /// g, kg, ml, l, pcs, tbsp or tsp
    pub unit: String,
    /// Store section, e.g. "Produce" or "Dairy"
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecipeStep {
    pub description: String,
    #[serde(default)]
    pub timer_minutes: Option<u32>,
}

impl StructuredOutput for Recipe {
    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("recipe has no name".to_string());
        }
        if self.ingredients.is_empty() {
            return Err(format!("recipe '{}' has no ingredients", self.name));
        }
        if self.steps.is_empty() {
            return Err(format!("recipe '{}' has no steps", self.name));
        }
        if let Some(bad) = self
            .ingredients
            .iter()
            .find(|i| !i.quantity.is_finite() || i.quantity < 0.0)
        {
            return Err(format!("ingredient '{}' has quantity {}", bad.name, bad.quantity));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PriceList {
    items: Vec<PricedItem>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PricedItem {
    name: String,
    purchase_quantity: f64,
    purchase_unit: String,
    estimated_price: f64,
}

impl StructuredOutput for PriceList {}

#[derive(Debug, Deserialize, JsonSchema)]
struct DayRevision {
    meals: Vec<RevisedMeal>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RevisedMeal {
    meal: String,
    dish: String,
    #[serde(default)]
    leftover: bool,
    /// Required unless the meal is leftovers
    #[serde(default)]
    recipe: Option<Recipe>,
}

impl StructuredOutput for DayRevision {
    fn validate(&self) -> Result<(), String> {
        if self.meals.is_empty() {
            return Err("revision lists no meals".to_string());
        }
        for meal in &self.meals {
            match &meal.recipe {
                Some(recipe) => recipe.validate()?,
                None if meal.leftover => {}
                None => return Err(format!("meal '{}' has no recipe", meal.dish)),
            }
        }
        Ok(())
    }
}

pub struct MealPlanner {
    profile: FamilyProfile,
}

impl MealPlanner {
    pub fn new(profile: FamilyProfile) -> Self {
        Self { profile }
    }

    fn household(&self) -> String {
        if self.profile.members.is_empty() {
            return "Not described".to_string();
        }
        self.profile
            .members
            .iter()
            .map(|m| {
                let mut line = format!("- {}, {} years", m.name, m.age);
                if !m.notes.trim().is_empty() {
                    line.push_str(&format!(": {}", m.notes.trim()));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn pantry(&self) -> String {
        if self.profile.pantry.is_empty() {
            "nothing".to_string()
        } else {
            self.profile.pantry.join(", ")
        }
    }

    fn fill(&self, template: &str) -> String {
        template
            .replace("{{DAYS}}", &self.profile.duration_days.max(1).to_string())
            .replace("{{HOUSEHOLD}}", &self.household())
            .replace("{{PREFERENCES}}", or_unspecified(&self.profile.preferences))
            .replace("{{CUISINE}}", or_unspecified(&self.profile.cuisine))
            .replace("{{DIFFICULTY}}", or_unspecified(&self.profile.difficulty))
            .replace("{{PANTRY}}", &self.pantry())
    }
}

#[async_trait]
impl PlanDomain for MealPlanner {
    fn kind(&self) -> PlanKind {
        PlanKind::Meals
    }

    async fn plan(&self, client: &CompletionClient) -> Result<Schedule, CompletionError> {
        let menu: Menu = client.complete(&self.fill(PLAN_PROMPT), "menu").await?;
        let schedule = menu_schedule(menu);
        info!(
            "Menu has {} days, {} meals, {} dishes to cook",
            schedule.groups.len(),
            schedule.slot_count(),
            schedule.planned_units().len()
        );
        Ok(schedule)
    }

    async fn detail(
        &self,
        client: &CompletionClient,
        unit_name: &str,
    ) -> Result<Value, CompletionError> {
        let prompt = self.fill(RECIPE_PROMPT).replace("{{DISH}}", unit_name);
        let mut recipe: Recipe = client
            .complete(&prompt, &format!("recipe: {}", unit_name))
            .await?;
        recipe.name = unit_name.to_string();
        Ok(to_payload(&recipe))
    }

    async fn aggregate(
        &self,
        client: &CompletionClient,
        plan: &Plan,
    ) -> Result<Option<Aggregate>, CompletionError> {
        let mut categories = fold_ingredients(plan, &self.profile.pantry);
        if categories.is_empty() {
            return Ok(Some(Aggregate::ShoppingList(shopping_list(
                categories,
                self.profile.budget,
            ))));
        }

        let budget = match self.profile.budget {
            Some(budget) => format!("About {} for the whole list", budget),
            None => "No fixed budget".to_string(),
        };
        let prompt = SHOPPING_PROMPT
            .replace("{{ITEMS}}", &item_lines(&categories))
            .replace("{{BUDGET}}", &budget);

        let prices: PriceList = client.complete(&prompt, "shopping list").await?;
        merge_prices(&mut categories, prices);

        Ok(Some(Aggregate::ShoppingList(shopping_list(
            categories,
            self.profile.budget,
        ))))
    }

    async fn revise_unit(
        &self,
        client: &CompletionClient,
        plan: &Plan,
        group: &str,
        slot: &str,
        hint: &str,
    ) -> Result<UnitDraft, CompletionError> {
        let current = plan
            .schedule
            .group(group)
            .and_then(|g| g.slot(slot))
            .map(|s| s.unit_name.clone())
            .unwrap_or_default();

        let prompt = self
            .fill(REVISE_MEAL_PROMPT)
            .replace("{{MENU}}", &menu_outline(plan))
            .replace("{{DAY}}", group)
            .replace("{{MEAL}}", slot)
            .replace("{{CURRENT}}", &current)
            .replace("{{HINT}}", hint_or_default(hint));

        let recipe: Recipe = client
            .complete(&prompt, &format!("revise {} {}", group, slot))
            .await?;

        Ok(UnitDraft {
            name: recipe.name.trim().to_string(),
            payload: to_payload(&recipe),
        })
    }

    async fn revise_group(
        &self,
        client: &CompletionClient,
        plan: &Plan,
        group: &str,
        hint: &str,
    ) -> Result<Vec<RevisedSlot>, CompletionError> {
        let prompt = self
            .fill(REVISE_DAY_PROMPT)
            .replace("{{MENU}}", &menu_outline(plan))
            .replace("{{DAY}}", group)
            .replace("{{HINT}}", hint_or_default(hint));

        let revision: DayRevision = client
            .complete(&prompt, &format!("revise {}", group))
            .await?;

        // Leftovers may only point at dishes cooked on a day that stays
        let cooked_elsewhere: BTreeSet<&str> = plan
            .schedule
            .groups
            .iter()
            .filter(|g| g.name != group)
            .flat_map(|g| g.slots.iter())
            .filter(|s| !s.carry_over)
            .map(|s| s.unit_name.as_str())
            .collect();

        let mut slots: Vec<RevisedSlot> = Vec::new();
        for meal in revision.meals {
            let key = meal.meal.trim().to_lowercase();
            let dish = meal.dish.trim();
            if key.is_empty() || dish.is_empty() || slots.iter().any(|s| s.key == key) {
                continue;
            }

            if meal.leftover && cooked_elsewhere.contains(dish) {
                slots.push(RevisedSlot {
                    key,
                    unit_name: dish.to_string(),
                    carry_over: true,
                    payload: None,
                });
            } else if let Some(mut recipe) = meal.recipe {
                recipe.name = dish.to_string();
                slots.push(RevisedSlot {
                    key,
                    unit_name: dish.to_string(),
                    carry_over: false,
                    payload: Some(to_payload(&recipe)),
                });
            } else {
                debug!("Dropping {} on {}: leftovers of an unknown dish", key, group);
            }
        }
        Ok(slots)
    }
}

/// Turn the planned menu into groups of meal slots
///
/// A leftover of a dish not cooked earlier in the week is planned as a
/// regular meal.
fn menu_schedule(menu: Menu) -> Schedule {
    let mut cooked = BTreeSet::new();
    let mut groups: Vec<Group> = Vec::new();

    for (index, day) in menu.days.into_iter().enumerate() {
        let mut name = day.day.trim().to_string();
        if name.is_empty() || groups.iter().any(|g| g.name == name) {
            name = format!("Day {}", index + 1);
        }

        let mut slots: Vec<Slot> = Vec::new();
        for meal in day.meals {
            let key = meal.meal.trim().to_lowercase();
            let dish = meal.dish.trim();
            if key.is_empty() || dish.is_empty() || slots.iter().any(|s| s.key == key) {
                continue;
            }
            let carry_over = meal.leftover && cooked.contains(dish);
            if !carry_over {
                cooked.insert(dish.to_string());
            }
            slots.push(Slot {
                key,
                unit_name: dish.to_string(),
                carry_over,
                unit_id: None,
            });
        }

        if !slots.is_empty() {
            groups.push(Group { name, slots });
        }
    }

    Schedule { groups }
}

fn menu_outline(plan: &Plan) -> String {
    plan.schedule
        .groups
        .iter()
        .map(|g| {
            let meals = g
                .slots
                .iter()
                .map(|s| {
                    if s.carry_over {
                        format!("{}: {} (leftovers)", s.key, s.unit_name)
                    } else {
                        format!("{}: {}", s.key, s.unit_name)
                    }
                })
                .collect::<Vec<_>>()
                .join("; ");
            format!("- {}: {}", g.name, meals)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// How many times a unit gets cooked; leftover slots do not count
fn cook_count(plan: &Plan, unit_id: &str) -> usize {
    plan.schedule
        .groups
        .iter()
        .flat_map(|g| g.slots.iter())
        .filter(|s| !s.carry_over && s.unit_id.as_deref() == Some(unit_id))
        .count()
        .max(1)
}

/// Sum every recipe's ingredients per category, name and unit
///
/// Pantry items are left out since they are already bought.
pub(crate) fn fold_ingredients(plan: &Plan, pantry: &[String]) -> Vec<ShoppingCategory> {
    let pantry: BTreeSet<String> = pantry.iter().map(|p| p.trim().to_lowercase()).collect();
    let mut categories: Vec<ShoppingCategory> = Vec::new();

    for unit in plan.units_in_order() {
        let Ok(recipe) = serde_json::from_value::<Recipe>(unit.payload.clone()) else {
            debug!("Unit '{}' is not a recipe, skipping", unit.name);
            continue;
        };
        let times = cook_count(plan, &unit.id) as f64;

        for ingredient in recipe.ingredients {
            let name = ingredient.name.trim();
            if name.is_empty() || pantry.contains(&name.to_lowercase()) {
                continue;
            }
            let category = match ingredient.category.trim() {
                "" => "Other",
                other => other,
            };
            let unit_name = ingredient.unit.trim().to_lowercase();
            let quantity = ingredient.quantity.max(0.0) * times;

            let index = match categories
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(category))
            {
                Some(index) => index,
                None => {
                    categories.push(ShoppingCategory {
                        name: category.to_string(),
                        items: Vec::new(),
                    });
                    categories.len() - 1
                }
            };

            let items = &mut categories[index].items;
            match items
                .iter_mut()
                .find(|i| i.name.eq_ignore_ascii_case(name) && i.unit == unit_name)
            {
                Some(item) => item.quantity += quantity,
                None => items.push(ShoppingItem {
                    name: name.to_string(),
                    quantity,
                    purchase: round_purchase(quantity, &unit_name),
                    unit: unit_name,
                    estimated_price: 0.0,
                }),
            }
        }
    }

    for item in categories.iter_mut().flat_map(|c| c.items.iter_mut()) {
        item.purchase = round_purchase(item.quantity, &item.unit);
    }
    categories
}

/// Round a needed amount up to a plausible pack size
pub fn round_purchase(quantity: f64, unit: &str) -> PurchaseSuggestion {
    let step = match unit {
        "g" => 100.0,
        "ml" => 250.0,
        "kg" | "l" => 0.5,
        _ => 1.0,
    };
    let packs = (quantity / step).ceil().max(1.0);
    PurchaseSuggestion {
        quantity: packs * step,
        unit: unit.to_string(),
    }
}

fn item_lines(categories: &[ShoppingCategory]) -> String {
    categories
        .iter()
        .flat_map(|c| {
            c.items.iter().map(move |i| {
                format!("- {} / {}: {} {}", c.name, i.name, format_quantity(i.quantity), i.unit)
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{}", quantity as i64)
    } else {
        format!("{:.2}", quantity)
    }
}

/// Take purchase suggestions and prices from the service; local sums always win
fn merge_prices(categories: &mut [ShoppingCategory], prices: PriceList) {
    let priced: BTreeMap<String, PricedItem> = prices
        .items
        .into_iter()
        .map(|p| (p.name.trim().to_lowercase(), p))
        .collect();

    for item in categories.iter_mut().flat_map(|c| c.items.iter_mut()) {
        let Some(price) = priced.get(&item.name.to_lowercase()) else {
            continue;
        };
        if price.purchase_quantity.is_finite()
            && price.purchase_quantity > 0.0
            && !price.purchase_unit.trim().is_empty()
        {
            item.purchase = PurchaseSuggestion {
                quantity: price.purchase_quantity,
                unit: price.purchase_unit.trim().to_string(),
            };
        }
        if price.estimated_price.is_finite() {
            item.estimated_price = price.estimated_price.max(0.0);
        }
    }
}

fn shopping_list(categories: Vec<ShoppingCategory>, budget: Option<u32>) -> ShoppingList {
    let total: f64 = categories
        .iter()
        .flat_map(|c| c.items.iter())
        .map(|i| i.estimated_price)
        .sum();
    let estimated_total = (total * 100.0).round() / 100.0;
    let budget = budget.map(f64::from);

    ShoppingList {
        categories,
        estimated_total,
        budget,
        over_budget: budget.map_or(false, |b| estimated_total > b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GenerationUnit, PlanRequest};
    use serde_json::json;

    fn recipe(name: &str, ingredients: &[(&str, f64, &str, &str)]) -> Value {
        json!({
            "name": name,
            "servings": 4,
            "cook_time_minutes": 30,
            "ingredients": ingredients
                .iter()
                .map(|(n, q, u, c)| json!({"name": n, "quantity": q, "unit": u, "category": c}))
                .collect::<Vec<_>>(),
            "steps": [{"description": "Cook"}],
        })
    }

    fn slot(key: &str, unit: &str, carry_over: bool) -> Slot {
        Slot {
            key: key.into(),
            unit_name: unit.into(),
            carry_over,
            unit_id: None,
        }
    }

    fn plan() -> Plan {
        let mut plan = Plan {
            request: PlanRequest::Meals(serde_json::from_value(json!({})).unwrap()),
            schedule: Schedule {
                groups: vec![
                    Group {
                        name: "Day 1".into(),
                        slots: vec![slot("lunch", "Soup", false), slot("dinner", "Soup", true)],
                    },
                    Group {
                        name: "Day 2".into(),
                        slots: vec![slot("lunch", "Soup", false), slot("dinner", "Pasta", false)],
                    },
                ],
            },
            units: BTreeMap::new(),
            aggregate: None,
            aggregate_stale: false,
        };
        for (id, name, payload) in [
            (
                "soup",
                "Soup",
                recipe("Soup", &[("Carrot", 150.0, "g", "Produce"), ("Salt", 1.0, "tsp", "Pantry")]),
            ),
            (
                "pasta",
                "Pasta",
                recipe("Pasta", &[("carrot", 100.0, "g", "produce"), ("Milk", 0.3, "l", "Dairy")]),
            ),
        ] {
            plan.units.insert(
                id.into(),
                GenerationUnit {
                    id: id.into(),
                    name: name.into(),
                    payload,
                },
            );
        }
        plan.link_slots();
        plan
    }

    #[test]
    fn test_menu_schedule_marks_only_known_leftovers() {
        let menu: Menu = serde_json::from_value(json!({
            "days": [
                {"day": "Day 1", "meals": [
                    {"meal": "Lunch", "dish": "Soup"},
                    {"meal": "dinner", "dish": "Stew", "leftover": true},
                    {"meal": "lunch", "dish": "Duplicate"}
                ]},
                {"day": "", "meals": [
                    {"meal": "lunch", "dish": "Soup", "leftover": true},
                    {"meal": "dinner", "dish": "  "}
                ]},
                {"day": "Day 3", "meals": []}
            ]
        }))
        .unwrap();

        let schedule = menu_schedule(menu);
        assert_eq!(schedule.groups.len(), 2);
        assert_eq!(schedule.groups[1].name, "Day 2");

        let day1 = &schedule.groups[0];
        assert_eq!(day1.slots.len(), 2);
        assert_eq!(day1.slots[0].key, "lunch");
        // Stew was never cooked, so it cannot be leftovers
        assert!(!day1.slots[1].carry_over);
        assert!(schedule.groups[1].slots[0].carry_over);
        assert_eq!(schedule.planned_units(), vec!["Soup", "Stew"]);
    }

    #[test]
    fn test_fold_sums_per_cook_and_skips_pantry() {
        let categories = fold_ingredients(&plan(), &["salt".to_string()]);

        let produce = categories.iter().find(|c| c.name == "Produce").unwrap();
        assert_eq!(produce.items.len(), 1);
        // Soup is cooked twice (the leftover slot adds nothing), pasta once
        assert_eq!(produce.items[0].quantity, 400.0);
        assert_eq!(produce.items[0].purchase.quantity, 400.0);

        assert!(categories.iter().all(|c| c.name != "Pantry"));
        let dairy = categories.iter().find(|c| c.name == "Dairy").unwrap();
        assert_eq!(dairy.items[0].purchase, PurchaseSuggestion { quantity: 0.5, unit: "l".into() });
    }

    #[test]
    fn test_round_purchase() {
        assert_eq!(round_purchase(250.0, "g").quantity, 300.0);
        assert_eq!(round_purchase(200.0, "g").quantity, 200.0);
        assert_eq!(round_purchase(0.0, "pcs").quantity, 1.0);
        assert_eq!(round_purchase(300.0, "ml").quantity, 500.0);
        assert_eq!(round_purchase(1.2, "kg").quantity, 1.5);
    }

    #[test]
    fn test_merge_prices_falls_back_to_local_rounding() {
        let mut categories = fold_ingredients(&plan(), &[]);
        let prices: PriceList = serde_json::from_value(json!({
            "items": [
                {"name": "CARROT", "purchase_quantity": 0.5, "purchase_unit": "kg", "estimated_price": 1.2},
                {"name": "Milk", "purchase_quantity": 0, "purchase_unit": "", "estimated_price": 0.9},
                {"name": "Unrelated", "purchase_quantity": 1, "purchase_unit": "pcs", "estimated_price": 99}
            ]
        }))
        .unwrap();
        merge_prices(&mut categories, prices);

        let items: Vec<&ShoppingItem> = categories.iter().flat_map(|c| c.items.iter()).collect();
        let carrot = items.iter().find(|i| i.name == "Carrot").unwrap();
        assert_eq!(carrot.purchase.unit, "kg");
        assert_eq!(carrot.quantity, 400.0);

        let milk = items.iter().find(|i| i.name == "Milk").unwrap();
        assert_eq!(milk.purchase.unit, "l");

        let list = shopping_list(categories, Some(2));
        assert_eq!(list.estimated_total, 2.1);
        assert!(list.over_budget);
        assert!(!shopping_list(Vec::new(), Some(2)).over_budget);
    }

    #[test]
    fn test_recipe_validation() {
        let empty: Recipe = serde_json::from_value(recipe("Toast", &[])).unwrap();
        assert!(empty.validate().is_err());

        let ok: Recipe =
            serde_json::from_value(recipe("Toast", &[("Bread", 2.0, "pcs", "Bakery")])).unwrap();
        assert!(ok.validate().is_ok());

        let revision: DayRevision = serde_json::from_value(json!({
            "meals": [{"meal": "lunch", "dish": "Soup", "leftover": false}]
        }))
        .unwrap();
        assert!(revision.validate().is_err());
    }
}
