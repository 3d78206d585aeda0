//! Job search: a list of openings matched to a career profile

use super::{hint_or_default, or_unspecified, to_payload, PlanDomain, RevisedSlot, UnitDraft};
use crate::completion::{CompletionClient, StructuredOutput};
use crate::error::CompletionError;
use crate::model::{
    Aggregate, CareerProfile, Group, Plan, PlanKind, RankedListing, Schedule, Shortlist, Slot,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const PLAN_PROMPT: &str = include_str!("../../prompts/jobs/plan.md");
const LISTING_PROMPT: &str = include_str!("../../prompts/jobs/listing.md");
const REVISE_LISTING_PROMPT: &str = include_str!("../../prompts/jobs/revise_listing.md");
const REVISE_ALL_PROMPT: &str = include_str!("../../prompts/jobs/revise_all.md");
const PLATFORMS_PROMPT: &str = include_str!("../../prompts/jobs/platforms.md");

/// How many platforms a suggestion asks for
const PLATFORM_COUNT: &str = "5-7";

/// The single group a job search plan has
pub const LISTINGS_GROUP: &str = "Listings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedListing {
    pub title: String,
    pub company: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListingPlan {
    listings: Vec<PlannedListing>,
}

impl StructuredOutput for ListingPlan {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobListing {
    pub title: String,
    pub company: String,
    /// A city or "Remote"
    pub location: String,
    pub salary: String,
    pub description: String,
    pub requirements: Vec<String>,
    /// Fit with the candidate, 0 to 100
    pub match_score: f64,
    pub match_reasoning: String,
}

impl JobListing {
    pub fn display_name(&self) -> String {
        listing_name(&self.title, &self.company)
    }
}

impl StructuredOutput for JobListing {
    fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() || self.company.trim().is_empty() {
            return Err("listing needs a title and a company".to_string());
        }
        if !(0.0..=100.0).contains(&self.match_score) {
            return Err(format!("match_score {} is outside 0..=100", self.match_score));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListingBatch {
    listings: Vec<JobListing>,
}

impl StructuredOutput for ListingBatch {
    fn validate(&self) -> Result<(), String> {
        if self.listings.is_empty() {
            return Err("no listings".to_string());
        }
        self.listings.iter().try_for_each(|l| l.validate())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PlatformList {
    platforms: Vec<String>,
}

impl StructuredOutput for PlatformList {
    fn validate(&self) -> Result<(), String> {
        if self.platforms.iter().all(|p| p.trim().is_empty()) {
            return Err("no platforms".to_string());
        }
        Ok(())
    }
}

/// Ask the service for popular job platforms for `role` (any IT role if empty)
pub async fn suggest_platforms(
    client: &CompletionClient,
    role: &str,
) -> Result<Vec<String>, CompletionError> {
    let role = if role.trim().is_empty() {
        "IT professionals"
    } else {
        role.trim()
    };
    let prompt = PLATFORMS_PROMPT
        .replace("{{COUNT}}", PLATFORM_COUNT)
        .replace("{{ROLE}}", role);

    let list: PlatformList = client.complete(&prompt, "job platforms").await?;
    let platforms = dedupe_platforms(list.platforms);
    info!("Suggested {} job platforms", platforms.len());
    Ok(platforms)
}

/// Trimmed, non-empty, first occurrence wins (case-insensitive)
fn dedupe_platforms(platforms: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    platforms
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(p.to_lowercase()))
        .collect()
}

fn listing_name(title: &str, company: &str) -> String {
    format!("{} at {}", title.trim(), company.trim())
}

pub struct JobScout {
    profile: CareerProfile,
}

impl JobScout {
    pub fn new(profile: CareerProfile) -> Self {
        Self { profile }
    }

    fn profile_text(&self) -> String {
        let p = &self.profile;
        let skills = p.key_skills.join(", ");
        [
            format!("- Desired role: {}", or_unspecified(&p.desired_role)),
            format!("- Experience: {} years", p.experience_years),
            format!("- Key skills: {}", or_unspecified(&skills)),
            format!(
                "- Salary expectation: {}",
                or_unspecified(p.salary_expectation.as_deref().unwrap_or(""))
            ),
            format!(
                "- Location: {}",
                or_unspecified(p.location.as_deref().unwrap_or(""))
            ),
            format!("- Summary and goals: {}", or_unspecified(&p.summary)),
        ]
        .join("\n")
    }

    fn count(&self) -> u32 {
        self.profile.listing_count.max(1)
    }
}

#[async_trait]
impl PlanDomain for JobScout {
    fn kind(&self) -> PlanKind {
        PlanKind::Jobs
    }

    async fn plan(&self, client: &CompletionClient) -> Result<Schedule, CompletionError> {
        let platforms = if self.profile.platforms.is_empty() {
            "any major job board".to_string()
        } else {
            self.profile.platforms.join(", ")
        };
        let prompt = PLAN_PROMPT
            .replace("{{PROFILE}}", &self.profile_text())
            .replace("{{COUNT}}", &self.count().to_string())
            .replace("{{PLATFORMS}}", &platforms);

        let planned: ListingPlan = client.complete(&prompt, "openings").await?;
        let schedule = listing_schedule(&planned.listings);
        info!("Planned {} openings", schedule.slot_count());
        Ok(schedule)
    }

    async fn detail(
        &self,
        client: &CompletionClient,
        unit_name: &str,
    ) -> Result<Value, CompletionError> {
        let prompt = LISTING_PROMPT
            .replace("{{PROFILE}}", &self.profile_text())
            .replace("{{LISTING}}", unit_name);
        let listing: JobListing = client
            .complete(&prompt, &format!("listing: {}", unit_name))
            .await?;
        Ok(to_payload(&listing))
    }

    async fn aggregate(
        &self,
        _client: &CompletionClient,
        plan: &Plan,
    ) -> Result<Option<Aggregate>, CompletionError> {
        Ok(Some(Aggregate::Shortlist(shortlist(plan))))
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

        let prompt = REVISE_LISTING_PROMPT
            .replace("{{PROFILE}}", &self.profile_text())
            .replace("{{LISTINGS}}", &listing_outline(plan))
            .replace("{{CURRENT}}", &current)
            .replace("{{HINT}}", hint_or_default(hint));

        let listing: JobListing = client
            .complete(&prompt, &format!("revise listing {}", slot))
            .await?;

        Ok(UnitDraft {
            name: listing.display_name(),
            payload: to_payload(&listing),
        })
    }

    async fn revise_group(
        &self,
        client: &CompletionClient,
        plan: &Plan,
        group: &str,
        hint: &str,
    ) -> Result<Vec<RevisedSlot>, CompletionError> {
        let count = plan
            .schedule
            .group(group)
            .map(|g| g.slots.len())
            .filter(|n| *n > 0)
            .unwrap_or(self.count() as usize);

        let prompt = REVISE_ALL_PROMPT
            .replace("{{PROFILE}}", &self.profile_text())
            .replace("{{LISTINGS}}", &listing_outline(plan))
            .replace("{{COUNT}}", &count.to_string())
            .replace("{{HINT}}", hint_or_default(hint));

        let batch: ListingBatch = client
            .complete(&prompt, &format!("revise {}", group))
            .await?;

        Ok(batch
            .listings
            .iter()
            .enumerate()
            .map(|(i, listing)| RevisedSlot {
                key: (i + 1).to_string(),
                unit_name: listing.display_name(),
                carry_over: false,
                payload: Some(to_payload(listing)),
            })
            .collect())
    }
}

/// One numbered slot per planned opening
fn listing_schedule(listings: &[PlannedListing]) -> Schedule {
    let slots: Vec<Slot> = listings
        .iter()
        .filter(|l| !l.title.trim().is_empty())
        .enumerate()
        .map(|(i, l)| Slot {
            key: (i + 1).to_string(),
            unit_name: listing_name(&l.title, &l.company),
            carry_over: false,
            unit_id: None,
        })
        .collect();

    if slots.is_empty() {
        return Schedule::default();
    }
    Schedule {
        groups: vec![Group {
            name: LISTINGS_GROUP.to_string(),
            slots,
        }],
    }
}

fn listing_outline(plan: &Plan) -> String {
    plan.schedule
        .groups
        .iter()
        .flat_map(|g| g.slots.iter())
        .map(|s| format!("- {}", s.unit_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rank listings by match score, best first
pub(crate) fn shortlist(plan: &Plan) -> Shortlist {
    let mut ranked: Vec<RankedListing> = plan
        .units_in_order()
        .into_iter()
        .filter_map(|unit| {
            let listing: JobListing = serde_json::from_value(unit.payload.clone()).ok()?;
            Some(RankedListing {
                unit_id: unit.id.clone(),
                title: listing.title,
                company: listing.company,
                match_score: listing.match_score,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));

    let average_match = if ranked.is_empty() {
        0.0
    } else {
        let sum: f64 = ranked.iter().map(|r| r.match_score).sum();
        (sum / ranked.len() as f64 * 10.0).round() / 10.0
    };

    let summary = match ranked.first() {
        Some(best) => format!(
            "{} openings, average match {:.0}%. Best fit: {} at {} ({:.0}%)",
            ranked.len(),
            average_match,
            best.title,
            best.company,
            best.match_score
        ),
        None => "No openings".to_string(),
    };

    Shortlist {
        ranked,
        average_match,
        summary,
    }
}
