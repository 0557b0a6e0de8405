//! # Shell Command Implementation
//!
//! Opens a command (`bash` by default) inside the running container of an
//! active service.

use anyhow::Result;
use clap::Args;

use blueprint::compose::ComposeCommand;
use blueprint::output::OutputConfig;
use blueprint::pipeline::{Action, Settings};

/// Open a shell in a running service
#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Service to enter
    #[arg(value_name = "SERVICE")]
    pub service: String,

    /// Command to run instead of bash
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Execute the `shell` command.
pub fn execute(args: ShellArgs, settings: &Settings, _output: &OutputConfig) -> Result<()> {
    let (pipeline, deployment) = super::prepare(settings, Action::Shell)?;
    super::selected_services(std::slice::from_ref(&args.service), &deployment)?;

    pipeline.run(
        &deployment,
        &ComposeCommand::Exec {
            service: args.service,
            command: args.command,
        },
    )?;
    Ok(())
}
