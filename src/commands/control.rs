//! # Container Control Commands
//!
//! `start`, `stop`, `restart`, `status` and `remove` share the same shape:
//! prepare the deployment for the action, then hand one compose command over
//! to the backend. Service lists are validated against the active set.

use anyhow::Result;
use clap::Args;

use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Settings};

/// Services targeted by a control command
#[derive(Args, Debug, Default)]
pub struct ServicesArgs {
    /// Services to act on (defaults to every active service)
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,
}

/// Execute one of the control commands.
pub fn execute(
    action: Action,
    args: ServicesArgs,
    settings: &Settings,
    output: &OutputConfig,
) -> Result<()> {
    let (pipeline, deployment) = super::prepare(settings, action)?;
    for warning in &deployment.warnings {
        println!("{} {}", emoji(output, "⚠️ ", "[WARN]"), warning);
    }
    for image in &deployment.built {
        println!("{} Built {}", emoji(output, "🔨", "[BUILT]"), image);
    }

    let services = super::selected_services(&args.services, &deployment)?;
    let command = action.compose_command(services)?;
    pipeline.run(&deployment, &command)?;

    if !matches!(action, Action::Status) {
        println!(
            "{} {} completed",
            emoji(output, "✅", "[OK]"),
            action
        );
    }
    Ok(())
}
