//! # Container Backend
//!
//! Everything that actually touches containers is delegated to
//! `docker compose`. The engine only decides which files, which env file and
//! which services to hand over.

use chrono::{DateTime, Utc};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::build_cache::ImageInspector;
use crate::error::{Error, Result};

/// A compose invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeCommand {
    Build { services: Vec<String> },
    Up { services: Vec<String> },
    Stop { services: Vec<String> },
    Restart { services: Vec<String> },
    Ps,
    Down,
    Logs { services: Vec<String>, follow: bool },
    Exec { service: String, command: Vec<String> },
}

impl ComposeCommand {
    /// Arguments following `docker compose <global options>`.
    pub fn args(&self) -> Vec<String> {
        fn with(head: &[&str], services: &[String]) -> Vec<String> {
            head.iter()
                .map(|s| s.to_string())
                .chain(services.iter().cloned())
                .collect()
        }

        match self {
            ComposeCommand::Build { services } => with(&["build"], services),
            ComposeCommand::Up { services } => with(&["up", "--detach"], services),
            ComposeCommand::Stop { services } => with(&["stop"], services),
            ComposeCommand::Restart { services } => with(&["restart"], services),
            ComposeCommand::Ps => with(&["ps"], &[]),
            ComposeCommand::Down => with(&["down"], &[]),
            ComposeCommand::Logs { services, follow } => {
                let head: &[&str] = if *follow {
                    &["logs", "--follow"]
                } else {
                    &["logs"]
                };
                with(head, services)
            }
            ComposeCommand::Exec { service, command } => {
                let mut args = vec!["exec".to_string(), service.clone()];
                if command.is_empty() {
                    args.push("bash".to_string());
                } else {
                    args.extend(command.iter().cloned());
                }
                args
            }
        }
    }
}

/// Runs compose commands over a set of layer files.
pub trait ComposeBackend {
    fn run(&self, files: &[PathBuf], env_file: &Path, command: &ComposeCommand) -> Result<()>;
}

/// [`ComposeBackend`] shelling out to `docker compose`.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    project_dir: PathBuf,
}

impl DockerCompose {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    /// Full argument list, global options included.
    pub fn command_line(files: &[PathBuf], env_file: &Path, command: &ComposeCommand) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "--env-file".to_string(),
            env_file.display().to_string(),
        ];
        for file in files {
            args.push("-f".to_string());
            args.push(file.display().to_string());
        }
        args.extend(command.args());
        args
    }
}

impl ComposeBackend for DockerCompose {
    fn run(&self, files: &[PathBuf], env_file: &Path, command: &ComposeCommand) -> Result<()> {
        let args = Self::command_line(files, env_file, command);
        info!("docker {}", command.args().join(" "));
        debug!("docker {}", args.join(" "));

        let status = Command::new("docker")
            .args(&args)
            .current_dir(&self.project_dir)
            .status()
            .map_err(|e| Error::Backend {
                command: command.args().join(" "),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(Error::Backend {
                command: command.args().join(" "),
                message: format!("docker compose exited with {}", status),
            });
        }
        Ok(())
    }
}

/// [`ImageInspector`] backed by `docker image inspect`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DockerImages;

/// Parses the `{{.Created}}` field of `docker image inspect`.
pub fn parse_created(output: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(output.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl ImageInspector for DockerImages {
    fn created(&self, image: &str) -> Result<Option<DateTime<Utc>>> {
        let output = Command::new("docker")
            .args(["image", "inspect", "--format", "{{.Created}}", image])
            .output()
            .map_err(|e| Error::Backend {
                command: format!("image inspect {}", image),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such image") {
                return Ok(None);
            }
            return Err(Error::Backend {
                command: format!("image inspect {}", image),
                message: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_created(&stdout).map(Some).ok_or_else(|| Error::Backend {
            command: format!("image inspect {}", image),
            message: format!("unexpected creation date {:?}", stdout.trim()),
        })
    }
}
