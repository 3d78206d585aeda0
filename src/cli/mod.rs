pub mod context;
pub mod generate;
pub mod history;
pub mod keys;
pub mod plan;
pub mod profile;
pub mod schema;

use clap::{Args, Parser, Subcommand};
use plansmith::editor::PlanTarget;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plansmith")]
#[command(
    author,
    version,
    about = "Resumable AI plan generator for weekly meal plans and job searches"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Where the user's document lives
#[derive(Args, Clone)]
pub struct StoreArgs {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "plansmith.yaml")]
    pub config: PathBuf,

    /// Override the user the document belongs to
    #[arg(long, global = true, env = "PLANSMITH_USER")]
    pub user: Option<String>,

    /// Override the document directory
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a draft from the stored profile, resuming an interrupted run
    Generate(GenerateArgs),

    /// Print the draft (or the committed plan with --committed)
    Show(TargetArgs),

    /// Accept the finished draft as the committed plan
    Accept,

    /// Throw away the draft or the unfinished run
    Discard,

    /// Regenerate the unit in one slot
    RegenUnit(RegenUnitArgs),

    /// Regenerate every slot of one group
    RegenGroup(RegenGroupArgs),

    /// Rebuild the shopping list or shortlist from the current units
    RefreshAggregate(TargetArgs),

    /// Manage the plan profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage API keys
    #[command(subcommand)]
    Keys(KeysCommand),

    /// Browse accepted plans
    #[command(subcommand)]
    History(HistoryCommand),

    /// Manage the cache of generated units
    #[command(subcommand)]
    Cache(CacheCommand),

    /// Print JSON Schema for config validation
    Schema(SchemaArgs),
}

#[derive(Parser, Clone)]
pub struct GenerateArgs {
    /// Start over instead of resuming an unfinished run
    #[arg(long)]
    pub restart: bool,

    /// Accept the draft as soon as it is finished
    #[arg(long)]
    pub accept: bool,
}

#[derive(Parser, Clone)]
pub struct TargetArgs {
    /// Act on the committed plan instead of the draft
    #[arg(long)]
    pub committed: bool,

    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

impl TargetArgs {
    pub fn target(&self) -> PlanTarget {
        plan_target(self.committed)
    }
}

#[derive(Parser, Clone)]
pub struct RegenUnitArgs {
    /// Group name, e.g. "Day 2" or "Listings"
    pub group: String,

    /// Slot key inside the group, e.g. "dinner" or "3"
    pub slot: String,

    /// Free-form guidance for the replacement
    #[arg(long, default_value = "")]
    pub hint: String,

    /// Edit the committed plan instead of the draft
    #[arg(long)]
    pub committed: bool,
}

#[derive(Parser, Clone)]
pub struct RegenGroupArgs {
    /// Group name, e.g. "Day 2"
    pub group: String,

    /// Free-form guidance for the replacement
    #[arg(long, default_value = "")]
    pub hint: String,

    /// Edit the committed plan instead of the draft
    #[arg(long)]
    pub committed: bool,
}

#[derive(Subcommand, Clone)]
pub enum ProfileCommand {
    /// Load the profile from a YAML file
    Set {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the stored profile as YAML
    Show,
    /// Suggest popular job platforms for the career profile
    Platforms {
        /// Store the suggestion in the profile
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum KeysCommand {
    /// List keys (masked) with their status
    List,
    /// Add a key, checking it against the service first
    Add {
        secret: String,

        /// Store the key without a test call
        #[arg(long)]
        skip_validation: bool,
    },
    /// Disable a key by its number in `keys list`
    Disable { index: usize },
    /// Re-enable a key by its number in `keys list`
    Enable { index: usize },
}

#[derive(Subcommand, Clone)]
pub enum HistoryCommand {
    /// List accepted plans, newest first
    List,
    /// Make a history entry the committed plan again
    Activate { index: usize },
    /// Remove a history entry
    Delete { index: usize },
}

#[derive(Parser, Clone)]
pub struct SchemaArgs {
    /// Print the profile schema instead
    #[arg(long)]
    pub profile: bool,
}

#[derive(Subcommand, Clone)]
pub enum CacheCommand {
    /// Forget every cached unit
    Clear,
}

pub fn plan_target(committed: bool) -> PlanTarget {
    if committed {
        PlanTarget::Committed
    } else {
        PlanTarget::Draft
    }
}

/// Convert a 1-based number from a listing into an index
pub fn zero_based(index: usize) -> anyhow::Result<usize> {
    index
        .checked_sub(1)
        .ok_or_else(|| anyhow::anyhow!("Numbers start at 1"))
}
