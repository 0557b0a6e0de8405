//! # Service Definitions and Parsing
//!
//! This module defines the data structures that represent one compose layer
//! file, and the logic for decoding it into a map of [`ServiceDefinition`]s.
//! Only the fields that drive deployment decisions are kept: `image`, `build`,
//! `depends_on` and `environment`. Every other compose key (ports, volumes,
//! networks, ...) is accepted and ignored, since it is passed untouched to
//! the container backend through the original files.
//!
//! ## Accepted Shapes
//!
//! Compose allows several spellings for the same thing. The parser accepts:
//!
//! - `build: ./path` and `build: {context: ./path, dockerfile: Custom}`
//! - `depends_on: [a, b]` and `depends_on: {a: {condition: ...}}`
//! - `environment: {KEY: value}` and `environment: ["KEY=value"]`
//!
//! Environment values are normalized to strings, so `ACTIVATE: 1`,
//! `ACTIVATE: "1"` and `ACTIVATE: true` can all be inspected the same way.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Build instructions of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    /// Build context, relative to the directory holding the compose layers.
    pub context: String,
    /// Dockerfile name inside the context, `Dockerfile` when omitted.
    #[serde(default)]
    pub dockerfile: Option<String>,
}

impl BuildSpec {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            dockerfile: None,
        }
    }
}

/// A single service after decoding, keyed by its unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub image: Option<String>,
    pub build: Option<BuildSpec>,
    /// Dependencies in declaration order, without duplicates.
    pub depends_on: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: None,
            build: None,
            depends_on: Vec::new(),
            environment: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_build(mut self, context: impl Into<String>) -> Self {
        self.build = Some(BuildSpec::new(context));
        self
    }

    pub fn depends_on(mut self, service: impl Into<String>) -> Self {
        let service = service.into();
        if !self.depends_on.contains(&service) {
            self.depends_on.push(service);
        }
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Value of an environment variable, if declared.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }
}

/// All services of one layer (or of a merged set), ordered by name.
pub type ServiceMap = BTreeMap<String, ServiceDefinition>;

#[derive(Debug, Default, Deserialize)]
struct ComposeFile {
    #[serde(default)]
    services: BTreeMap<String, Option<RawService>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    build: Option<RawBuild>,
    #[serde(default)]
    depends_on: Option<RawDependsOn>,
    #[serde(default)]
    environment: Option<RawEnvironment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBuild {
    Context(String),
    Full(BuildSpec),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    Map(BTreeMap<String, Value>),
    List(Vec<String>),
}

/// Render a scalar YAML value the way it would appear in an env file.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl RawService {
    fn into_definition(self, name: String) -> ServiceDefinition {
        let build = self.build.map(|b| match b {
            RawBuild::Context(context) => BuildSpec::new(context),
            RawBuild::Full(spec) => spec,
        });

        let mut depends_on: Vec<String> = Vec::new();
        let names: Vec<String> = match self.depends_on {
            Some(RawDependsOn::List(list)) => list,
            Some(RawDependsOn::Map(map)) => map.into_keys().collect(),
            None => Vec::new(),
        };
        for dep in names {
            if !depends_on.contains(&dep) {
                depends_on.push(dep);
            }
        }

        let environment = match self.environment {
            Some(RawEnvironment::Map(map)) => map
                .into_iter()
                .map(|(k, v)| (k, scalar_to_string(&v)))
                .collect(),
            Some(RawEnvironment::List(list)) => list
                .into_iter()
                .map(|entry| match entry.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (entry, String::new()),
                })
                .collect(),
            None => BTreeMap::new(),
        };

        ServiceDefinition {
            name,
            image: self.image,
            build,
            depends_on,
            environment,
        }
    }
}

/// Decode an already-parsed YAML document into its services.
///
/// A null document (an empty file) yields an empty map.
pub fn services_from_value(value: Value) -> Result<ServiceMap> {
    if value.is_null() {
        return Ok(ServiceMap::new());
    }
    if !value.is_mapping() {
        return Err(Error::configuration(
            "Expected a YAML mapping at the top of the compose file",
        ));
    }

    let compose: ComposeFile = serde_yaml::from_value(value)?;
    Ok(compose
        .services
        .into_iter()
        .map(|(name, raw)| {
            let service = raw.unwrap_or_default().into_definition(name.clone());
            (name, service)
        })
        .collect())
}

/// Parse the services of a compose YAML string.
pub fn parse_services(yaml_content: &str) -> Result<ServiceMap> {
    let value: Value = serde_yaml::from_str(yaml_content)?;
    services_from_value(value)
}

/// Parse the services of a compose file on disk.
pub fn services_from_file<P: AsRef<Path>>(path: P) -> Result<ServiceMap> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse_services(&content)
}

/// Expands compose-style variable references.
///
/// Supports `${VAR}`, `${VAR:-default}`, `${VAR-default}`, `$VAR` and the
/// `$$` escape. Unknown variables expand to an empty string.
pub struct Interpolator<'a> {
    pattern: Regex,
    vars: &'a BTreeMap<String, String>,
}

impl<'a> Interpolator<'a> {
    pub fn new(vars: &'a BTreeMap<String, String>) -> Result<Self> {
        let pattern = Regex::new(
            r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?-)([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)",
        )?;
        Ok(Self { pattern, vars })
    }

    pub fn expand(&self, value: &str) -> String {
        if !value.contains('$') {
            return value.to_string();
        }
        self.pattern
            .replace_all(value, |caps: &regex::Captures| {
                let Some(name) = caps.get(1).or_else(|| caps.get(4)) else {
                    return "$".to_string();
                };
                let found = self.vars.get(name.as_str());
                match (caps.get(2).map(|m| m.as_str()), found) {
                    (Some(":-"), Some(v)) if v.is_empty() => {
                        caps.get(3).map(|m| m.as_str()).unwrap_or_default().to_string()
                    }
                    (_, Some(v)) => v.clone(),
                    (Some(_), None) => {
                        caps.get(3).map(|m| m.as_str()).unwrap_or_default().to_string()
                    }
                    (None, None) => String::new(),
                }
            })
            .into_owned()
    }

    /// Expands the image, build context and environment of every service.
    pub fn apply(&self, services: &mut ServiceMap) {
        for service in services.values_mut() {
            if let Some(image) = &mut service.image {
                *image = self.expand(image);
            }
            if let Some(build) = &mut service.build {
                build.context = self.expand(&build.context);
            }
            for value in service.environment.values_mut() {
                *value = self.expand(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_service() {
        let yaml = r#"
version: '3'
services:
  backend:
    image: myproject/backend:1.0
    build:
      context: builds/backend
      dockerfile: Dockerfile.dev
    depends_on:
      - postgres
      - rabbit
    environment:
      ACTIVATE: 1
      DEBUG: "true"
    ports:
      - "8080:8080"
  postgres:
    image: postgres:15
"#;

        let services = parse_services(yaml).unwrap();
        assert_eq!(services.len(), 2);

        let backend = &services["backend"];
        assert_eq!(backend.name, "backend");
        assert_eq!(backend.image.as_deref(), Some("myproject/backend:1.0"));
        let build = backend.build.as_ref().unwrap();
        assert_eq!(build.context, "builds/backend");
        assert_eq!(build.dockerfile.as_deref(), Some("Dockerfile.dev"));
        assert_eq!(backend.depends_on, vec!["postgres", "rabbit"]);
        assert_eq!(backend.env("ACTIVATE"), Some("1"));
        assert_eq!(backend.env("DEBUG"), Some("true"));

        let postgres = &services["postgres"];
        assert!(postgres.build.is_none());
        assert!(postgres.depends_on.is_empty());
    }

    #[test]
    fn test_parse_short_build_and_mapping_depends_on() {
        let yaml = r#"
services:
  proxy:
    build: builds/proxy
    depends_on:
      backend:
        condition: service_healthy
"#;
        let services = parse_services(yaml).unwrap();
        let proxy = &services["proxy"];
        assert_eq!(proxy.build, Some(BuildSpec::new("builds/proxy")));
        assert_eq!(proxy.depends_on, vec!["backend"]);
    }

    #[test]
    fn test_parse_environment_list_form() {
        let yaml = r#"
services:
  worker:
    environment:
      - ACTIVATE=1
      - EMPTY
      - URL=http://host/?a=b
"#;
        let services = parse_services(yaml).unwrap();
        let worker = &services["worker"];
        assert_eq!(worker.env("ACTIVATE"), Some("1"));
        assert_eq!(worker.env("EMPTY"), Some(""));
        assert_eq!(worker.env("URL"), Some("http://host/?a=b"));
    }

    #[test]
    fn test_parse_service_without_body() {
        let yaml = r#"
services:
  bare:
"#;
        let services = parse_services(yaml).unwrap();
        assert_eq!(services["bare"], ServiceDefinition::new("bare"));
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse_services("").unwrap().is_empty());
        assert!(parse_services("version: '3'\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_mapping() {
        let result = parse_services("- a\n- b\n");
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_duplicate_dependencies_are_collapsed() {
        let yaml = r#"
services:
  a:
    depends_on: [b, b, c]
"#;
        let services = parse_services(yaml).unwrap();
        assert_eq!(services["a"].depends_on, vec!["b", "c"]);
    }

    #[test]
    fn test_interpolation() {
        let vars: BTreeMap<String, String> = [
            ("ACTIVATE_POSTGRES", "1"),
            ("VERSION", "2.4"),
            ("EMPTY", ""),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let interpolator = Interpolator::new(&vars).unwrap();

        assert_eq!(interpolator.expand("${ACTIVATE_POSTGRES}"), "1");
        assert_eq!(interpolator.expand("rapydo/backend:$VERSION"), "rapydo/backend:2.4");
        assert_eq!(interpolator.expand("${MISSING}"), "");
        assert_eq!(interpolator.expand("${MISSING:-0}"), "0");
        assert_eq!(interpolator.expand("${EMPTY:-x}"), "x");
        assert_eq!(interpolator.expand("${EMPTY-x}"), "");
        assert_eq!(interpolator.expand("cost: $$5"), "cost: $5");
        assert_eq!(interpolator.expand("plain"), "plain");
    }

    #[test]
    fn test_interpolation_applies_to_services() {
        let vars: BTreeMap<String, String> =
            [("TAG".to_string(), "1.0".to_string())].into_iter().collect();
        let mut services = parse_services(
            "services:\n  api:\n    image: api:${TAG}\n    environment:\n      ACTIVATE: ${ACTIVATE_API:-1}\n",
        )
        .unwrap();

        Interpolator::new(&vars).unwrap().apply(&mut services);
        assert_eq!(services["api"].image.as_deref(), Some("api:1.0"));
        assert_eq!(services["api"].env("ACTIVATE"), Some("1"));
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&Value::Null), "");
        assert_eq!(scalar_to_string(&Value::Bool(false)), "false");
        assert_eq!(scalar_to_string(&Value::from(42)), "42");
        assert_eq!(scalar_to_string(&Value::from("x")), "x");
    }
}
