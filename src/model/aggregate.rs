use serde::{Deserialize, Serialize};

/// The folded result of all units of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregate {
    ShoppingList(ShoppingList),
    Shortlist(Shortlist),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub categories: Vec<ShoppingCategory>,

    pub estimated_total: f64,

    #[serde(default)]
    pub budget: Option<f64>,

    /// Advisory only; generation never fails on it
    #[serde(default)]
    pub over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCategory {
    pub name: String,
    pub items: Vec<ShoppingItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub name: String,

    /// Summed quantity the recipes call for
    pub quantity: f64,

    pub unit: String,

    pub purchase: PurchaseSuggestion,

    /// Estimated price of the suggested purchase
    #[serde(default)]
    pub estimated_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseSuggestion {
    pub quantity: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shortlist {
    pub ranked: Vec<RankedListing>,
    pub average_match: f64,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedListing {
    pub unit_id: String,
    pub title: String,
    pub company: String,
    pub match_score: f64,
}
