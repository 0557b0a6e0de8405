//! # Update Command Implementation
//!
//! This module implements the `update` subcommand, which pulls the tracked
//! branch of every enabled repository. A repository with unstaged files is
//! left untouched and reported. The network is required.

use anyhow::Result;
use clap::Args;

use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Settings};

/// Pull the latest changes of every project repository
#[derive(Args, Debug)]
pub struct UpdateArgs {}

/// Execute the `update` command.
pub fn execute(_args: UpdateArgs, settings: &Settings, output: &OutputConfig) -> Result<()> {
    println!("{} Updating repositories...", emoji(output, "🔄", "[UPDATE]"));
    let (_, deployment) = super::prepare(settings, Action::Update)?;
    super::print_summary(output, &deployment);

    let updated = deployment.repositories.iter().filter(|r| r.updated).count();
    let skipped = deployment.repositories.len() - updated;
    println!(
        "{} {} repositor{} updated",
        emoji(output, "✅", "[OK]"),
        updated,
        if updated == 1 { "y" } else { "ies" }
    );
    if skipped > 0 {
        println!(
            "{} {} repositor{} not updated, see warnings above",
            emoji(output, "⚠️ ", "[WARN]"),
            skipped,
            if skipped == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}
