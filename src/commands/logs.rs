//! # Logs Command Implementation

use anyhow::Result;
use clap::Args;

use blueprint::compose::ComposeCommand;
use blueprint::output::OutputConfig;
use blueprint::pipeline::{Action, Settings};

/// Show the logs of the active services
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Services to show (defaults to every active service)
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,

    /// Keep streaming new log lines
    #[arg(short, long)]
    pub follow: bool,
}

/// Execute the `logs` command.
pub fn execute(args: LogsArgs, settings: &Settings, _output: &OutputConfig) -> Result<()> {
    let (pipeline, deployment) = super::prepare(settings, Action::Logs)?;
    let services = super::selected_services(&args.services, &deployment)?;
    pipeline.run(
        &deployment,
        &ComposeCommand::Logs {
            services,
            follow: args.follow,
        },
    )?;
    Ok(())
}
