use plansmith::config::Config;
use plansmith::model::PlanRequest;
use schemars::schema_for;

/// Config schema, or the profile schema with `profile`
pub fn execute(profile: bool) -> anyhow::Result<()> {
    let schema = if profile {
        schema_for!(PlanRequest)
    } else {
        schema_for!(Config)
    };
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{}", json);
    Ok(())
}
