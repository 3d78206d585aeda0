use crate::cli::context;
use crate::cli::{zero_based, HistoryCommand, StoreArgs};
use plansmith::output::render_history;

pub async fn execute(command: HistoryCommand, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;

    match command {
        HistoryCommand::List => print!("{}", render_history(&assistant.history())),
        HistoryCommand::Activate { index } => {
            let entry = assistant.activate_history(zero_based(index)?).await?;
            println!(
                "Activated the {} accepted {}",
                entry.plan.request.kind(),
                entry.accepted_at.format("%Y-%m-%d %H:%M")
            );
        }
        HistoryCommand::Delete { index } => {
            let entry = assistant.delete_history(zero_based(index)?).await?;
            println!(
                "Deleted the {} accepted {}",
                entry.plan.request.kind(),
                entry.accepted_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    context::finish(&assistant).await
}
