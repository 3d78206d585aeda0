use crate::cli::context;
use crate::cli::{zero_based, KeysCommand, StoreArgs};
use plansmith::assistant::Assistant;
use plansmith::model::Credential;
use plansmith::output::render_credentials;

fn nth(assistant: &Assistant, index: usize) -> anyhow::Result<Credential> {
    let credentials = assistant.list_credentials();
    let len = credentials.len();
    credentials
        .into_iter()
        .nth(zero_based(index)?)
        .ok_or_else(|| anyhow::anyhow!("No key number {} ({} keys)", index, len))
}

pub async fn execute(command: KeysCommand, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;

    match command {
        KeysCommand::List => print!("{}", render_credentials(&assistant.list_credentials())),
        KeysCommand::Add {
            secret,
            skip_validation,
        } => {
            let credential = Credential::new(secret.trim());
            if assistant.add_credential(&secret, !skip_validation).await? {
                println!("Added {}", credential.masked());
            } else {
                println!("{} is already configured", credential.masked());
            }
        }
        KeysCommand::Disable { index } => {
            let credential = nth(&assistant, index)?;
            if assistant.disable_credential(&credential.secret).await? {
                println!("Disabled {}", credential.masked());
            } else {
                println!("{} was already disabled", credential.masked());
            }
        }
        KeysCommand::Enable { index } => {
            let credential = nth(&assistant, index)?;
            if assistant.enable_credential(&credential.secret).await? {
                println!("Enabled {}", credential.masked());
            } else {
                println!("{} was already enabled", credential.masked());
            }
        }
    }

    context::finish(&assistant).await
}
