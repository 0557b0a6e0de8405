//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a project fixture and a handful of layer snippets
//! so each test only spells out what it is about.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_minimal_project();
//!     fixture.command().arg("check").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::layers;
    pub use super::TestFixture;
}

/// Compose layer and project configuration snippets.
#[allow(dead_code)]
pub mod layers {
    /// Minimal project configuration, no repository.
    pub const PROJECT: &str = r#"
project:
  name: demo
  title: Demo project
variables:
  env:
    DB_NAME: demo
    PROJECT_TITLE: Demo project
"#;

    /// Backend layer: one service always on, two optional.
    pub const BACKEND: &str = r#"
services:
  backend:
    image: demo/backend:1.0
    depends_on:
      - postgres
    environment:
      ACTIVATE: 1
  postgres:
    image: postgres:16
    environment:
      POSTGRES_DB: ${DB_NAME}
  rabbit:
    image: rabbitmq:3
"#;

    /// Empty commons layer.
    pub const COMMONS: &str = "services: {}\n";

    /// Blueprint layer enabling the proxy.
    pub const PRODUCTION: &str = r#"
services:
  proxy:
    image: nginx:1.25
    depends_on: [backend]
    environment:
      ACTIVATE: "true"
"#;

    /// Blueprint layer deactivating the backend.
    pub const NOTHING_ACTIVE: &str = r#"
services:
  backend:
    image: demo/backend:1.0
    environment:
      ACTIVATE: 0
"#;

    /// Blueprint layer with an unresolved placeholder.
    pub const WITH_PLACEHOLDER: &str = r#"
services:
  rabbit:
    image: rabbitmq:3
    environment:
      ACTIVATE: 1
      RABBITMQ_PASSWORD: "**PLACEHOLDER**"
"#;
}

/// A test fixture holding a temporary project directory.
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_minimal_project()
///     .with_layer("staging", layers::PRODUCTION);
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Write `specs/project_configuration.yaml`.
    pub fn with_project(self, content: &str) -> Self {
        self.with_file("specs/project_configuration.yaml", content)
    }

    /// Write `containers/<name>.yml`.
    pub fn with_layer(self, name: &str, content: &str) -> Self {
        self.with_file(&format!("containers/{}.yml", name), content)
    }

    /// A project with backend, commons and a `production` blueprint.
    pub fn with_minimal_project(self) -> Self {
        self.with_project(layers::PROJECT)
            .with_layer("backend", layers::BACKEND)
            .with_layer("commons", layers::COMMONS)
            .with_layer("production", layers::PRODUCTION)
    }

    /// Write `.projectrc`.
    pub fn with_projectrc(self, content: &str) -> Self {
        self.with_file(".projectrc", content)
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Read a file of the project.
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).expect("Failed to read file")
    }

    /// Create an offline command running in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("blueprint");
        cmd.current_dir(self.path())
            .arg("--offline")
            .arg("--color=never")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_project_layout() {
        let fixture = TestFixture::new().with_minimal_project();
        assert!(fixture.path().join("specs/project_configuration.yaml").exists());
        assert!(fixture.path().join("containers/backend.yml").exists());
        assert!(fixture.path().join("containers/production.yml").exists());
    }

    #[test]
    fn test_snippets_are_valid_yaml() {
        for snippet in [
            layers::PROJECT,
            layers::BACKEND,
            layers::COMMONS,
            layers::PRODUCTION,
            layers::NOTHING_ACTIVE,
            layers::WITH_PLACEHOLDER,
        ] {
            serde_yaml::from_str::<serde_yaml::Value>(snippet).expect("Snippet should be valid YAML");
        }
    }
}
