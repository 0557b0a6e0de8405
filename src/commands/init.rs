//! # Init Command Implementation
//!
//! This module implements the `init` subcommand. It clones the enabled
//! repositories that are missing, configures the `upstream` remote of the
//! project when one is declared, and writes the `.env` file.
//!
//! Placeholders are not checked and no template image is resolved, so a
//! freshly created project can be initialized before its configuration is
//! complete. Repositories that already exist are verified like in `check`.

use anyhow::Result;
use clap::Args;

use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Settings};

/// Clone the project repositories and create the .env file
#[derive(Args, Debug)]
pub struct InitArgs {}

/// Execute the `init` command.
pub fn execute(_args: InitArgs, settings: &Settings, output: &OutputConfig) -> Result<()> {
    println!(
        "{} Initializing project in {}",
        emoji(output, "🚀", "[INIT]"),
        settings.project_dir.display()
    );
    let (_, deployment) = super::prepare(settings, Action::Init)?;

    let cloned = deployment.repositories.iter().filter(|r| r.cloned).count();
    super::print_summary(output, &deployment);
    if deployment.env_written {
        println!(
            "{} Created {}",
            emoji(output, "📝", "[ENV]"),
            deployment.env_file.display()
        );
    }

    println!(
        "{} Project initialized ({} repositor{} cloned)",
        emoji(output, "✅", "[OK]"),
        cloned,
        if cloned == 1 { "y" } else { "ies" }
    );
    Ok(())
}
