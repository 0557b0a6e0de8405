//! # Build Command Implementation
//!
//! This module implements the `build` subcommand. Template images that are
//! missing (or stale, with `--force-build`) are built first, then the images
//! of the active services that declare a build. Services sharing an image are
//! built once.

use anyhow::Result;
use clap::Args;

use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Settings};

/// Build template images and the images of the active services
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Services to build (defaults to every active service with a build)
    #[arg(value_name = "SERVICE")]
    pub services: Vec<String>,
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs, settings: &Settings, output: &OutputConfig) -> Result<()> {
    let (pipeline, deployment) = super::prepare(settings, Action::Build)?;
    super::print_summary(output, &deployment);
    for image in &deployment.built {
        println!("{} Built {}", emoji(output, "🔨", "[BUILT]"), image);
    }

    let services = if args.services.is_empty() {
        deployment.active_builds()
    } else {
        let selected = super::selected_services(&args.services, &deployment)?;
        deployment.unique_builds(&selected)
    };
    if services.is_empty() {
        println!(
            "{} No active service declares a build",
            emoji(output, "ℹ️ ", "[INFO]")
        );
        return Ok(());
    }

    println!(
        "{} Building {}",
        emoji(output, "🔨", "[BUILD]"),
        services.join(", ")
    );
    pipeline.run(&deployment, &Action::Build.compose_command(services)?)?;
    println!("{} Images built", emoji(output, "✅", "[OK]"));
    Ok(())
}
