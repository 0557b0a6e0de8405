//! # Project Configuration
//!
//! A project is described by `specs/project_configuration.yaml`, merged on
//! top of the optional `specs/defaults.yaml`. A developer can further
//! override it locally through the `project_configuration` section of the
//! `.projectrc` file, which also provides defaults for CLI flags.
//!
//! Merging works on raw YAML values before anything is deserialized:
//! mappings are merged recursively, everything else is replaced by the
//! overriding document.

use log::{debug, warn};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::activation::is_truthy;
use crate::config::scalar_to_string;
use crate::defaults::{
    DEFAULTS_CONF_FILE, PROJECTRC_FILE, PROJECT_CONF_FILE, SPECS_DIR, SUBMODULES_DIR,
};
use crate::error::{Error, Result};
use crate::repository::RepositorySpec;

/// Recursively merges `source` into `target`.
///
/// Mappings are merged key by key. A null value never erases a mapping.
/// Any other value replaces the target.
pub fn mix(target: &mut Value, source: &Value) {
    mix_at(target, source, "")
}

fn mix_at(target: &mut Value, source: &Value, path: &str) {
    match (target, source) {
        (Value::Mapping(target_map), Value::Mapping(source_map)) => {
            for (key, value) in source_map {
                let key_str = match key {
                    Value::String(s) => s.clone(),
                    other => scalar_to_string(other),
                };
                let new_path = if path.is_empty() {
                    key_str
                } else {
                    format!("{}.{}", path, key_str)
                };
                match target_map.get_mut(key) {
                    Some(existing) => mix_at(existing, value, &new_path),
                    None => {
                        target_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Mapping(_), Value::Null) => {
            warn!("Cannot replace {} with an empty value", path);
        }
        (target, source) => {
            debug!("Overriding {}", path);
            *target = source.clone();
        }
    }
}

/// Descriptive project metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

fn enabled_by_default() -> Value {
    Value::Bool(true)
}

/// A repository entry of `variables.repos`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepoEntry {
    /// Location under `submodules/`, defaults to the entry name.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(alias = "online_url")]
    pub url: String,
    pub branch: String,
    /// Boolean condition, possibly a `$$variable` reference.
    #[serde(rename = "if", default = "enabled_by_default")]
    pub condition: Value,
}

/// The project's own upstream remote.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamEntry {
    #[serde(alias = "online_url")]
    pub url: String,
    /// Repository carrying the remote, relative to the project root.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Variables {
    /// Whether the frontend layer is part of the stack.
    #[serde(default)]
    pub frontend: bool,
    /// Values written to the derived env file.
    #[serde(default)]
    pub env: BTreeMap<String, Value>,
    #[serde(default)]
    pub repos: BTreeMap<String, RepoEntry>,
    #[serde(default)]
    pub upstream: Option<UpstreamEntry>,
    /// Any other variable, available to `$$name` conditions.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The merged project configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub variables: Variables,
    /// Blueprint used when none is given on the command line.
    #[serde(default)]
    pub blueprint: Option<String>,
}

fn read_yaml(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    debug!("Reading {}", path.display());
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_yaml::from_str(&content)?))
}

impl ProjectConfig {
    /// Loads the configuration of the project rooted at `project_dir`.
    ///
    /// `host_override` is merged last (see [`Projectrc`]).
    pub fn load(project_dir: &Path, host_override: Option<&Value>) -> Result<Self> {
        let specs = project_dir.join(SPECS_DIR);
        let custom_path = specs.join(PROJECT_CONF_FILE);
        let custom = read_yaml(&custom_path)?.ok_or_else(|| Error::Configuration {
            message: format!("Missing project configuration {}", custom_path.display()),
            hint: Some(format!(
                "create {}/{} with at least a `project:` section",
                SPECS_DIR, PROJECT_CONF_FILE
            )),
        })?;

        let mut merged = read_yaml(&specs.join(DEFAULTS_CONF_FILE))?
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::Mapping(Mapping::new()));
        mix(&mut merged, &custom);
        if let Some(host) = host_override {
            mix(&mut merged, host);
        }

        Self::from_value(merged)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_mapping() {
            return Err(Error::configuration(
                "Expected a YAML mapping in the project configuration",
            ));
        }
        Ok(serde_yaml::from_value(value)?)
    }

    /// Name used for the compose project.
    ///
    /// Falls back to the project directory name. Lowercased, with anything
    /// but alphanumerics, `-` and `_` removed.
    pub fn project_name(&self, project_dir: &Path) -> String {
        let raw = self
            .project
            .name
            .clone()
            .or_else(|| {
                project_dir
                    .canonicalize()
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            })
            .unwrap_or_else(|| "blueprint".to_string());
        raw.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect()
    }

    /// `variables.env` rendered as strings.
    pub fn env_variables(&self) -> BTreeMap<String, String> {
        self.variables
            .env
            .iter()
            .map(|(k, v)| (k.clone(), scalar_to_string(v)))
            .collect()
    }

    fn resolve_condition(&self, condition: &Value) -> bool {
        let resolved = match condition {
            Value::String(s) if s.starts_with("$$") => {
                let name = s.trim_start_matches('$');
                if name == "frontend" {
                    Value::Bool(self.variables.frontend)
                } else {
                    self.variables.extra.get(name).cloned().unwrap_or(Value::Null)
                }
            }
            other => other.clone(),
        };
        match resolved {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => is_truthy(&s),
            _ => false,
        }
    }

    /// Enabled repositories, in name order.
    pub fn repositories(&self) -> Vec<RepositorySpec> {
        self.variables
            .repos
            .iter()
            .filter(|(name, entry)| {
                let enabled = self.resolve_condition(&entry.condition);
                if !enabled {
                    debug!("Repository {} is disabled", name);
                }
                enabled
            })
            .map(|(name, entry)| RepositorySpec {
                name: name.clone(),
                path: PathBuf::from(SUBMODULES_DIR).join(entry.path.as_deref().unwrap_or(name)),
                url: entry.url.clone(),
                branch: entry.branch.clone(),
            })
            .collect()
    }
}

/// Local developer overrides, read from `.projectrc`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Projectrc {
    #[serde(default)]
    pub blueprint: Option<String>,
    #[serde(default)]
    pub force_build: Option<bool>,
    #[serde(default)]
    pub skip_network: Option<bool>,
    #[serde(default)]
    pub skip_repo: Vec<String>,
    #[serde(default)]
    pub force_env: Option<bool>,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Merged on top of the project configuration.
    #[serde(default, alias = "project_configuration")]
    pub project_configuration: Option<Value>,
}

impl Projectrc {
    /// Loads `.projectrc` from `project_dir`, or defaults when absent.
    pub fn load(project_dir: &Path) -> Result<Self> {
        match read_yaml(&project_dir.join(PROJECTRC_FILE))? {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => Ok(serde_yaml::from_value(value)?),
        }
    }
}
