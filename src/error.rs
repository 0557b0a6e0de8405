//! # Error Handling
//!
//! This module defines the centralized error type for the `blueprint`
//! library. It uses `thiserror` to build a single `Error` enum whose variants
//! mirror the failure taxonomy of a deployment run:
//!
//! - **Configuration**: a mandatory layer is missing or empty, no service is
//!   active, or a `depends_on` edge points at an unknown service.
//! - **Placeholder**: active services still carry unresolved placeholder
//!   values. Every offending key is listed at once.
//! - **DependencyResolution**: a template build has no image tag, or an
//!   override references a template that does not exist.
//! - **RepoSync**: a synchronized repository has the wrong remote or branch.
//! - **BuildCacheMissing**: a template image does not exist and the run is
//!   not allowed to build it.
//! - **Network**: the connectivity pre-check failed for an action that needs
//!   the network.
//!
//! Every fatal variant aborts the run. Messages carry an optional `hint:`
//! line telling the user how to fix the problem.

use thiserror::Error;

fn render_hint(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!("\n  hint: {}", h))
        .unwrap_or_default()
}

/// Main error type for blueprint operations
#[derive(Error, Debug)]
pub enum Error {
    /// The merged configuration cannot produce a valid deployment.
    #[error("Configuration error: {message}{}", render_hint(hint))]
    Configuration {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// Active services still contain placeholder values.
    ///
    /// `keys` holds one line per missing variable, already sorted.
    #[error(
        "The following variables are missing in your configuration:\n{}\n  hint: set them in specs/project_configuration.yaml or in your local .projectrc",
        keys.iter().map(|k| format!("    {}", k)).collect::<Vec<_>>().join("\n")
    )]
    Placeholder { keys: Vec<String> },

    /// Template builds could not be resolved.
    #[error("Build dependency error for {service}: {message}{}", render_hint(hint))]
    DependencyResolution {
        service: String,
        message: String,
        hint: Option<String>,
    },

    /// A Dockerfile could not be read or has no usable `FROM` instruction.
    #[error("Dockerfile error in {path}: {message}")]
    Dockerfile { path: String, message: String },

    /// A synchronized repository does not match its expected state.
    #[error("Repository {repo}: {message}{}", render_hint(hint))]
    RepoSync {
        repo: String,
        message: String,
        hint: Option<String>,
    },

    /// Template images are missing and the run may not build them.
    #[error(
        "Missing template image(s): {}\n  hint: run `blueprint build` or add --force-build",
        images.join(", ")
    )]
    BuildCacheMissing { images: Vec<String> },

    /// The connectivity pre-check failed.
    #[error("Network unavailable ({target}): {message}")]
    Network { target: String, message: String },

    /// An error occurred while executing a Git command.
    #[error("Git command failed in {path}: {command} - {stderr}")]
    GitCommand {
        command: String,
        path: String,
        stderr: String,
    },

    /// The container backend reported a failure.
    #[error("Container backend error: {command} - {message}")]
    Backend { command: String, message: String },

    /// The requested action has no implementation.
    #[error("Command not yet implemented: {feature}")]
    NotImplemented { feature: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Shorthand for a `Configuration` error without a hint.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            hint: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
