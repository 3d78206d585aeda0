use crate::cli::context;
use crate::cli::{GenerateArgs, StoreArgs};
use futures::StreamExt;
use plansmith::assistant::GenerationEvent;
use plansmith::error::AssistantError;
use plansmith::model::Stage;
use plansmith::output::{render_checkpoint, render_plan};
use tracing::{error, info};

pub async fn execute(args: GenerateArgs, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let request = assistant.profile().ok_or(AssistantError::NoProfile)?;

    if args.restart && assistant.discard_draft().await? {
        info!("Discarded the previous run");
    } else if let Some(checkpoint) = assistant.checkpoint() {
        if checkpoint.stage != Stage::Done && checkpoint.is_for(&request) {
            eprint!("Resuming: {}", render_checkpoint(&checkpoint));
        }
    }

    let mut events = Box::pin(assistant.begin_generation(request));
    let mut outcome = None;
    while let Some(event) = events.next().await {
        match event {
            GenerationEvent::Progress(progress) if progress.unit_total > 0 => {
                eprintln!(
                    "[{}] {}/{} {}",
                    progress.stage, progress.unit_index, progress.unit_total, progress.message
                );
            }
            GenerationEvent::Progress(progress) => {
                eprintln!("[{}] {}", progress.stage, progress.message);
            }
            GenerationEvent::Finished(result) => outcome = Some(result),
        }
    }

    let draft = match outcome {
        Some(Ok(plan)) => plan,
        Some(Err(e)) => {
            error!("Generation stopped: {}", e);
            context::finish(&assistant).await?;
            eprintln!("Progress is saved; run `plansmith generate` again to resume.");
            return Err(e.into());
        }
        None => anyhow::bail!("Generation task ended without a result"),
    };

    if args.accept {
        let committed = assistant.accept_draft(draft).await?;
        println!("{}", render_plan(&committed.plan, "Committed plan"));
    } else {
        println!("{}", render_plan(&draft, "Draft"));
        eprintln!("Review the draft, then run `plansmith accept` or `plansmith discard`.");
    }

    context::finish(&assistant).await
}
