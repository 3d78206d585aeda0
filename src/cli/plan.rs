use crate::cli::context;
use crate::cli::{plan_target, RegenGroupArgs, RegenUnitArgs, StoreArgs, TargetArgs};
use plansmith::editor::{PlanTarget, UnitSelector};
use plansmith::error::AssistantError;
use plansmith::model::Plan;
use plansmith::output::{render_checkpoint, render_plan};

fn title(target: PlanTarget) -> &'static str {
    match target {
        PlanTarget::Draft => "Draft",
        PlanTarget::Committed => "Committed plan",
    }
}

fn print_plan(plan: &Plan, target: PlanTarget, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
    } else {
        println!("{}", render_plan(plan, title(target)));
    }
    Ok(())
}

pub async fn show(args: TargetArgs, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let target = args.target();

    let plan = match target {
        PlanTarget::Draft => assistant.draft(),
        PlanTarget::Committed => assistant.committed().map(|c| c.plan),
    };

    match plan {
        Some(plan) => print_plan(&plan, target, args.json)?,
        None => match (target, assistant.checkpoint()) {
            (PlanTarget::Draft, Some(checkpoint)) => {
                print!("{}", render_checkpoint(&checkpoint));
                println!("Run `plansmith generate` to resume.");
            }
            (PlanTarget::Draft, None) => println!("No draft. Run `plansmith generate` first."),
            (PlanTarget::Committed, _) => println!("No committed plan yet."),
        },
    }

    context::finish(&assistant).await
}

pub async fn accept(store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let draft = assistant.draft().ok_or(AssistantError::NoDraft)?;
    let committed = assistant.accept_draft(draft).await?;
    println!(
        "Accepted {} with {} units",
        committed.plan.request.kind(),
        committed.plan.units.len()
    );
    context::finish(&assistant).await
}

pub async fn discard(store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    if assistant.discard_draft().await? {
        println!("Draft discarded");
    } else {
        println!("Nothing to discard");
    }
    context::finish(&assistant).await
}

pub async fn regen_unit(args: RegenUnitArgs, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let target = plan_target(args.committed);
    let selector = UnitSelector::new(args.group, args.slot);

    let plan = assistant
        .regenerate_unit(target, &selector, &args.hint)
        .await?;
    print_plan(&plan, target, false)?;
    context::finish(&assistant).await
}

pub async fn regen_group(args: RegenGroupArgs, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let target = plan_target(args.committed);

    let plan = assistant
        .regenerate_group(target, &args.group, &args.hint)
        .await?;
    print_plan(&plan, target, false)?;
    context::finish(&assistant).await
}

pub async fn refresh_aggregate(args: TargetArgs, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let target = args.target();

    let plan = assistant.refresh_aggregate(target).await?;
    print_plan(&plan, target, args.json)?;
    context::finish(&assistant).await
}

pub async fn clear_cache(store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;
    let cleared = assistant.clear_unit_cache().await?;
    println!("Cleared {} cached units", cleared);
    context::finish(&assistant).await
}
