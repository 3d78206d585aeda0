use crate::cli::StoreArgs;
use plansmith::assistant::Assistant;
use plansmith::completion::CompletionClient;
use plansmith::config::Config;
use plansmith::credentials::CredentialPool;
use plansmith::provider::GeminiFactory;
use plansmith::store::{Connection, FileDocumentStore, StateManager};
use std::sync::Arc;
use tracing::info;

/// Load config, connect to the user's document and build the assistant
pub async fn connect(args: &StoreArgs) -> anyhow::Result<Arc<Assistant>> {
    info!("Loading config from {:?}", args.config);
    let mut config = Config::load_or_default(&args.config)?;

    // Apply CLI overrides
    if let Some(user) = &args.user {
        config.user = user.clone();
    }
    if let Some(store_dir) = &args.store_dir {
        config.store_dir = store_dir.clone();
    }

    config.validate()?;

    let store = Arc::new(FileDocumentStore::new(&config.store_dir));
    let (state, connection) =
        StateManager::connect(store, &config.user, config.save_debounce()).await?;
    if connection == Connection::Created {
        info!(
            "Created a new document for '{}' in {}",
            config.user,
            config.store_dir.display()
        );
    }

    let factory = Arc::new(GeminiFactory::new(&config.endpoint, config.call_timeout())?);
    let client = CompletionClient::new(CredentialPool::new(state.clone()), factory, &config);

    Ok(Arc::new(Assistant::new(
        state,
        Arc::new(client),
        config.history_limit,
    )))
}

/// Write any pending debounced change before the process exits
pub async fn finish(assistant: &Assistant) -> anyhow::Result<()> {
    assistant.state().flush().await?;
    Ok(())
}
