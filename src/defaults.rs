//! Default values for blueprint configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::time::Duration;

/// Sentinel marking a required value that was never supplied.
pub const PLACEHOLDER: &str = "**PLACEHOLDER**";

/// Tag suffix identifying a base image built from a shared template.
pub const TEMPLATE_SUFFIX: &str = ":template";

/// Environment key that activates a top-level service.
pub const ACTIVATE_KEY: &str = "ACTIVATE";

/// Directory holding the compose layers, relative to the project root.
pub const CONTAINERS_DIR: &str = "containers";

/// Extension of compose layer files.
pub const LAYER_EXTENSION: &str = "yml";

/// Directory holding the project specs, relative to the project root.
pub const SPECS_DIR: &str = "specs";

/// Project configuration written by the user.
pub const PROJECT_CONF_FILE: &str = "project_configuration.yaml";

/// Defaults shipped with the project, merged below the project configuration.
pub const DEFAULTS_CONF_FILE: &str = "defaults.yaml";

/// Local, uncommitted overrides for CLI defaults.
pub const PROJECTRC_FILE: &str = ".projectrc";

/// Environment file derived from the active service set.
pub const ENV_FILE: &str = ".env";

/// Directory holding the synchronized repositories.
pub const SUBMODULES_DIR: &str = "submodules";

/// Name of the remote every synchronized repository must track.
pub const ORIGIN_REMOTE: &str = "origin";

/// Name of the remote pointing at the project's canonical upstream.
pub const UPSTREAM_REMOTE: &str = "upstream";

/// Upper bound of ahead/behind commits reported per repository.
pub const MAX_REPORTED_COMMITS: usize = 20;

/// Commit messages longer than this are truncated in reports.
pub const MAX_COMMIT_MESSAGE: usize = 60;

/// Endpoint probed by the connectivity pre-check.
pub const CONNECTIVITY_TARGET: &str = "github.com:443";

/// Timeout of the connectivity pre-check.
pub const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(3);
