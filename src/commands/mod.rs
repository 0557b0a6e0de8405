//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `blueprint` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` together with the run
//!   [`Settings`] and performs the command's logic.
//!
//! The options shared by every command live in [`GlobalArgs`]. They are
//! combined with the project's `.projectrc` into [`Settings`], and
//! [`prepare`] runs the deployment pipeline for the command's action.

pub mod build;
pub mod check;
pub mod completions;
pub mod control;
pub mod env;
pub mod init;
pub mod logs;
pub mod shell;
pub mod tree;
pub mod update;

use anyhow::Result;
use clap::Args;
use log::LevelFilter;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use blueprint::defaults::{CONTAINERS_DIR, LAYER_EXTENSION, SPECS_DIR};
use blueprint::output::{self, emoji, OutputConfig};
use blueprint::pipeline::{Action, Deployment, Pipeline, Settings};
use blueprint::project::Projectrc;
use blueprint::suggestions;

/// Layers that are part of every deployment and never a blueprint.
const RESERVED_LAYERS: &[&str] = &["backend", "frontend", "commons"];

/// Options accepted by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Blueprint to deploy (a containers/<NAME>.yml layer)
    #[arg(short, long, global = true, value_name = "NAME")]
    pub blueprint: Option<String>,

    /// Rebuild every template image, fresh or not
    #[arg(long, global = true)]
    pub force_build: bool,

    /// Skip the connectivity check and every remote repository check
    #[arg(long, global = true, visible_alias = "offline")]
    pub skip_network: bool,

    /// Do not synchronize this repository (repeatable)
    #[arg(long, global = true, value_name = "NAME")]
    pub skip_repo: Vec<String>,

    /// Regenerate the .env file even if it already exists
    #[arg(long, global = true)]
    pub force_env: bool,

    /// Root of the project
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: String,
}

impl GlobalArgs {
    /// Builds the run settings. Flags win over `.projectrc`.
    pub fn settings(&self) -> Result<Settings> {
        let project_dir = &self.project_dir;
        if !project_dir.join(SPECS_DIR).is_dir() || !project_dir.join(CONTAINERS_DIR).is_dir() {
            return Err(suggestions::project_not_found(project_dir));
        }

        let rc = Projectrc::load(project_dir)?;
        let level = self
            .log_level
            .as_deref()
            .or(rc.log_level.as_deref())
            .unwrap_or("info");

        let mut settings = Settings {
            project_dir: project_dir.clone(),
            blueprint: self.blueprint.clone(),
            force_build: self.force_build,
            skip_network: self.skip_network,
            skip_repos: self.skip_repo.clone(),
            force_env: self.force_env,
            log_level: parse_level(level)?,
        };
        settings.apply_projectrc(&rc);
        Ok(settings)
    }
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level).map_err(|_| {
        anyhow::anyhow!(
            "Invalid log level: {level}\n\n\
             hint: Use one of off, error, warn, info, debug, trace"
        )
    })
}

/// Names of the blueprint layers found in the containers folder.
pub fn available_blueprints(project_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(project_dir.join(CONTAINERS_DIR)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == LAYER_EXTENSION))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .filter(|name| !RESERVED_LAYERS.contains(&name.as_str()))
        .collect();
    names.sort();
    names
}

/// Runs the pipeline for `action`, rejecting unknown blueprints up front.
pub fn prepare(settings: &Settings, action: Action) -> Result<(Pipeline, Deployment)> {
    if let Some(name) = &settings.blueprint {
        let available = available_blueprints(&settings.project_dir);
        if !available.contains(name) {
            return Err(suggestions::unknown_blueprint(name, &available));
        }
    }

    let pipeline = Pipeline::new(settings.clone());
    let deployment = pipeline.prepare(action)?;
    Ok((pipeline, deployment))
}

/// Prints the repository, service and build cache sections of a run.
pub fn print_summary(output: &OutputConfig, deployment: &Deployment) {
    if !deployment.repositories.is_empty() {
        println!("{} Repositories:", emoji(output, "📦", "[REPOS]"));
        for line in output::render_repositories(output, &deployment.repositories) {
            println!("  {}", line);
        }
    }

    println!("{}", output::render_active(output, &deployment.active));

    if let Some(plan) = &deployment.plan {
        if !plan.verdicts.is_empty() {
            println!("{} Template images:", emoji(output, "🏗️ ", "[BUILDS]"));
            for line in output::render_build_plan(output, plan) {
                println!("  {}", line);
            }
        }
    }

    for warning in &deployment.warnings {
        println!("{} {}", emoji(output, "⚠️ ", "[WARN]"), warning);
    }
}

/// Services named on the command line, or every active service.
pub fn selected_services(requested: &[String], deployment: &Deployment) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(deployment.active.as_slice().to_vec());
    }
    for service in requested {
        if !deployment.active.contains(service) {
            return Err(suggestions::inactive_service(
                service,
                deployment.active.as_slice(),
            ));
        }
    }
    Ok(requested.to_vec())
}
