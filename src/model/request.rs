use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The caller-owned profile a generation run is built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanRequest {
    Meals(FamilyProfile),
    Jobs(CareerProfile),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Meals,
    Jobs,
}

impl std::fmt::Display for PlanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanKind::Meals => write!(f, "meal plan"),
            PlanKind::Jobs => write!(f, "job search"),
        }
    }
}

impl PlanRequest {
    pub fn kind(&self) -> PlanKind {
        match self {
            PlanRequest::Meals(_) => PlanKind::Meals,
            PlanRequest::Jobs(_) => PlanKind::Jobs,
        }
    }

    /// Stable digest used to tell whether a checkpoint belongs to this request
    pub fn fingerprint(&self) -> String {
        // Serializing a plain struct into a Vec cannot fail
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FamilyProfile {
    #[serde(default)]
    pub members: Vec<FamilyMember>,

    #[serde(default)]
    pub preferences: String,

    #[serde(default = "default_any")]
    pub cuisine: String,

    #[serde(default = "default_any")]
    pub difficulty: String,

    #[serde(default = "default_duration_days")]
    pub duration_days: u32,

    /// Advisory total budget for the shopping list
    #[serde(default)]
    pub budget: Option<u32>,

    /// Items already bought that the plan should use up
    #[serde(default)]
    pub pantry: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FamilyMember {
    pub name: String,

    #[serde(default)]
    pub age: u32,

    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CareerProfile {
    pub desired_role: String,

    #[serde(default)]
    pub experience_years: u32,

    #[serde(default)]
    pub key_skills: Vec<String>,

    #[serde(default)]
    pub salary_expectation: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub platforms: Vec<String>,

    #[serde(default = "default_listing_count")]
    pub listing_count: u32,
}

fn default_any() -> String {
    "any".to_string()
}

fn default_duration_days() -> u32 {
    7
}

fn default_listing_count() -> u32 {
    8
}
