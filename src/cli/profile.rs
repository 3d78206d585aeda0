use crate::cli::context;
use crate::cli::{ProfileCommand, StoreArgs};
use anyhow::Context;
use plansmith::model::PlanRequest;

pub async fn execute(command: ProfileCommand, store: &StoreArgs) -> anyhow::Result<()> {
    let assistant = context::connect(store).await?;

    match command {
        ProfileCommand::Set { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read profile '{}'", file.display()))?;
            let request: PlanRequest = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse profile '{}'", file.display()))?;
            let kind = request.kind();
            assistant.set_profile(request);
            println!("Profile saved ({})", kind);
        }
        ProfileCommand::Show => match assistant.profile() {
            Some(request) => print!("{}", serde_yaml::to_string(&request)?),
            None => println!("No profile set. Use `plansmith profile set <FILE>`."),
        },
        ProfileCommand::Platforms { apply } => {
            let platforms = assistant.suggest_platforms().await?;
            for platform in &platforms {
                println!("- {}", platform);
            }
            if apply {
                assistant.set_platforms(platforms)?;
                println!("Platforms saved to the profile");
            }
        }
    }

    context::finish(&assistant).await
}
