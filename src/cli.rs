//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use blueprint::output::OutputConfig;
use blueprint::pipeline::Action;

use crate::commands::{self, GlobalArgs};

/// Blueprint - Prepare and run multi-service container deployments
#[derive(Parser, Debug)]
#[command(name = "blueprint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify repositories, services and template images
    Check(commands::check::CheckArgs),

    /// Clone the project repositories and create the .env file
    Init(commands::init::InitArgs),

    /// Pull the latest changes of every project repository
    Update(commands::update::UpdateArgs),

    /// Build template images and the images of the active services
    Build(commands::build::BuildArgs),

    /// Start the active services
    Start(commands::control::ServicesArgs),

    /// Stop the active services
    Stop(commands::control::ServicesArgs),

    /// Restart the active services
    Restart(commands::control::ServicesArgs),

    /// Show the status of the deployed containers
    Status(commands::control::ServicesArgs),

    /// Stop and remove the deployed containers
    Remove(commands::control::ServicesArgs),

    /// Show the logs of the active services
    Logs(commands::logs::LogsArgs),

    /// Open a shell in a running service
    Shell(commands::shell::ShellArgs),

    /// Print the environment passed to the containers
    Env(commands::env::EnvArgs),

    /// Display the dependency tree of the active services
    Tree(commands::tree::TreeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

fn init_logger(level: LevelFilter) {
    // A second initialization (tests) is harmless
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let output = OutputConfig::from_env_and_flag(&self.global.color);

        if let Commands::Completions(args) = self.command {
            return commands::completions::execute(args);
        }

        let settings = self.global.settings()?;
        init_logger(settings.log_level);

        match self.command {
            Commands::Check(args) => commands::check::execute(args, &settings, &output),
            Commands::Init(args) => commands::init::execute(args, &settings, &output),
            Commands::Update(args) => commands::update::execute(args, &settings, &output),
            Commands::Build(args) => commands::build::execute(args, &settings, &output),
            Commands::Start(args) => {
                commands::control::execute(Action::Start, args, &settings, &output)
            }
            Commands::Stop(args) => {
                commands::control::execute(Action::Stop, args, &settings, &output)
            }
            Commands::Restart(args) => {
                commands::control::execute(Action::Restart, args, &settings, &output)
            }
            Commands::Status(args) => {
                commands::control::execute(Action::Status, args, &settings, &output)
            }
            Commands::Remove(args) => {
                commands::control::execute(Action::Remove, args, &settings, &output)
            }
            Commands::Logs(args) => commands::logs::execute(args, &settings, &output),
            Commands::Shell(args) => commands::shell::execute(args, &settings, &output),
            Commands::Env(args) => commands::env::execute(args, &settings, &output),
            Commands::Tree(args) => commands::tree::execute(args, &settings, &output),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "blueprint",
            "check",
            "-b",
            "production",
            "--offline",
            "--skip-repo",
            "http-api",
            "--skip-repo",
            "frontend",
        ])
        .unwrap();
        assert_eq!(cli.global.blueprint.as_deref(), Some("production"));
        assert!(cli.global.skip_network);
        assert_eq!(cli.global.skip_repo, vec!["http-api", "frontend"]);
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn test_shell_command_after_separator() {
        let cli = Cli::try_parse_from(["blueprint", "shell", "backend", "--", "ls", "-l"]).unwrap();
        match cli.command {
            Commands::Shell(args) => {
                assert_eq!(args.service, "backend");
                assert_eq!(args.command, vec!["ls", "-l"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
