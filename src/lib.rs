//! # Blueprint Library
//!
//! This library decides what a multi-service container deployment consists
//! of before anything is started. It is used by the `blueprint` command-line
//! tool, which hands the result over to `docker compose`.
//!
//! ## Quick Example
//!
//! ```
//! use blueprint::activation;
//! use blueprint::config::ServiceDefinition;
//! use blueprint::config::ServiceMap;
//!
//! let mut services = ServiceMap::new();
//! for service in [
//!     ServiceDefinition::new("backend")
//!         .depends_on("postgres")
//!         .with_env("ACTIVATE", "1"),
//!     ServiceDefinition::new("postgres"),
//!     ServiceDefinition::new("rabbit"),
//! ] {
//!     services.insert(service.name.clone(), service);
//! }
//!
//! let active = activation::find_active(&services).unwrap();
//! assert_eq!(active.as_slice(), ["backend", "postgres"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Layers (`layers`, `config`)**: a blueprint is a stack of compose files
//!   (`backend`, optional `frontend`, `commons`, then the blueprint itself)
//!   merged in order, the last layer winning per key.
//! - **Activation (`activation`)**: services opt in with `ACTIVATE: 1`; the
//!   active set is closed over `depends_on`, and active services must not
//!   carry placeholder values.
//! - **Template builds (`builds`, `dockerfile`)**: shared base images built
//!   once and referenced by the `FROM` line of service Dockerfiles.
//! - **Build cache (`build_cache`)**: template images older than their last
//!   source commit are stale; missing ones must be built.
//! - **Repositories (`repository`, `git`)**: project submodules must sit on
//!   the expected remote and branch; drift is reported.
//! - **Pipeline (`pipeline`)**: runs every step above for one action and
//!   writes the derived `.env` file (`envfile`).
//!
//! Every external fact (git, docker, the filesystem, the network) enters
//! through a trait, so the whole pipeline can be exercised in memory.

pub mod activation;
pub mod build_cache;
pub mod builds;
pub mod compose;
pub mod config;
pub mod defaults;
pub mod dockerfile;
pub mod envfile;
pub mod error;
pub mod git;
pub mod layers;
pub mod network;
pub mod output;
pub mod pipeline;
pub mod project;
pub mod repository;
pub mod suggestions;

#[cfg(test)]
mod graph_proptest;
