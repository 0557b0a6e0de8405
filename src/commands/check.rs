//! # Check Command Implementation
//!
//! This module implements the `check` subcommand, which verifies that the
//! project can be deployed without changing anything:
//!
//! - **Repositories**: every enabled repository is on the expected remote and
//!   branch. Commits behind or ahead of the remote are reported.
//! - **Services**: the blueprint layers merge into a configuration with at
//!   least one active service and no placeholder left.
//! - **Template images**: every template image referenced by the active
//!   services exists and is newer than its last source change.
//!
//! Missing template images fail the check unless `--force-build` is given,
//! in which case they are built. The `.env` file is written when missing.

use anyhow::Result;
use clap::Args;

use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Settings};

/// Verify repositories, services and template images
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Print the compose files used by the deployment
    #[arg(long)]
    pub files: bool,
}

/// Execute the `check` command.
pub fn execute(args: CheckArgs, settings: &Settings, output: &OutputConfig) -> Result<()> {
    println!("{} Checking project...", emoji(output, "🔍", "[CHECK]"));
    let (_, deployment) = super::prepare(settings, Action::Check)?;

    if args.files {
        println!("{} Compose files:", emoji(output, "📄", "[FILES]"));
        for file in &deployment.config.files {
            println!("  {}", file.display());
        }
    }

    super::print_summary(output, &deployment);
    for image in &deployment.built {
        println!("{} Built {}", emoji(output, "🔨", "[BUILT]"), image);
    }

    println!(
        "{} Blueprint {} is ready",
        emoji(output, "✅", "[OK]"),
        deployment.blueprint
    );
    Ok(())
}
