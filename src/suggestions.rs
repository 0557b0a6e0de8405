//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! Two flavors are provided: plain hint strings, attached to the library
//! `Error` variants that carry a `hint` field, and ready-made
//! `anyhow::Error`s used by the command layer.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Not a blueprint project: {}", dir.display());
//!
//! // Use:
//! return Err(suggestions::project_not_found(dir));
//! ```

use std::path::Path;

use crate::defaults::{CONTAINERS_DIR, SPECS_DIR};

/// Hint for a configuration without any active service.
pub fn activate_a_service() -> String {
    "set ACTIVATE: 1 in the environment of at least one service of your blueprint".to_string()
}

/// Hint for a repository that must be created by `init`.
pub fn run_init() -> String {
    "run `blueprint init` to clone and configure the project repositories".to_string()
}

/// Hint for a repository cloned from the wrong remote.
pub fn reclone(path: &Path) -> String {
    format!("remove {} and run `blueprint init`", path.display())
}

/// Hint for a repository on the wrong branch.
pub fn checkout(path: &Path, branch: &str) -> String {
    format!(
        "git -C {} checkout {} (or run `blueprint init`)",
        path.display(),
        branch
    )
}

/// Generate an error for a directory that is not a blueprint project.
pub fn project_not_found(dir: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Not a blueprint project: {dir}\n\n\
         hint: Run the command from the project root, or use --project-dir\n\
         hint: A project needs {specs}/ and {containers}/ folders",
        dir = dir.display(),
        specs = SPECS_DIR,
        containers = CONTAINERS_DIR,
    )
}

/// Generate an error for a blueprint without a compose layer.
///
/// Suggests the closest existing blueprint, if any.
pub fn unknown_blueprint(name: &str, available: &[String]) -> anyhow::Error {
    let candidates: Vec<&str> = available.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(name, &candidates)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unknown blueprint: {name}{did_you_mean}\n\n\
         Available blueprints are: {list}\n\
         hint: Each blueprint is a {containers}/<name>.yml layer",
        list = if available.is_empty() {
            "(none)".to_string()
        } else {
            available.join(", ")
        },
        containers = CONTAINERS_DIR,
    )
}

/// Generate an error for a service that is not part of the deployment.
pub fn inactive_service(name: &str, active: &[String]) -> anyhow::Error {
    let candidates: Vec<&str> = active.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(name, &candidates)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Service {name} is not active{did_you_mean}\n\n\
         Active services are: {list}\n\
         hint: Set ACTIVATE: 1 in its environment to enable it",
        list = active.join(", "),
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Single rolling row
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut diagonal = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let above = row[j];
            let cost = usize::from(a[i - 1] != b[j - 1]);
            row[j] = (above + 1).min(row[j - 1] + 1).min(diagonal + cost);
            diagonal = above;
        }
    }
    row[b.len()]
}
