use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;

use cli::{CacheCommand, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("plansmith=debug")
    } else {
        EnvFilter::new("plansmith=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let store = &cli.store;
    match cli.command {
        Commands::Generate(args) => cli::generate::execute(args, store).await,
        Commands::Show(args) => cli::plan::show(args, store).await,
        Commands::Accept => cli::plan::accept(store).await,
        Commands::Discard => cli::plan::discard(store).await,
        Commands::RegenUnit(args) => cli::plan::regen_unit(args, store).await,
        Commands::RegenGroup(args) => cli::plan::regen_group(args, store).await,
        Commands::RefreshAggregate(args) => cli::plan::refresh_aggregate(args, store).await,
        Commands::Profile(command) => cli::profile::execute(command, store).await,
        Commands::Keys(command) => cli::keys::execute(command, store).await,
        Commands::History(command) => cli::history::execute(command, store).await,
        Commands::Cache(CacheCommand::Clear) => cli::plan::clear_cache(store).await,
        Commands::Schema(args) => cli::schema::execute(args.profile),
    }
}
