//! # Env Command Implementation
//!
//! Prints the derived `.env` file handed to the container backend. The file
//! is created first when missing (or regenerated with `--force-env`).

use anyhow::Result;
use clap::Args;

use blueprint::envfile;
use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Settings};

/// Print the environment passed to the containers
#[derive(Args, Debug)]
pub struct EnvArgs {
    /// Print the variables as a JSON object
    #[arg(long)]
    pub json: bool,
}

/// Execute the `env` command.
pub fn execute(args: EnvArgs, settings: &Settings, output: &OutputConfig) -> Result<()> {
    let (_, deployment) = super::prepare(settings, Action::Env)?;
    let vars = envfile::read(&deployment.env_file)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&vars)?);
        return Ok(());
    }

    println!(
        "{} {}{}",
        emoji(output, "📝", "[ENV]"),
        deployment.env_file.display(),
        if deployment.env_written { " (created)" } else { "" }
    );
    print!("{}", envfile::render(&vars));
    Ok(())
}
