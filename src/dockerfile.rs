//! Dockerfile inspection.
//!
//! Only the base image of the first build stage matters for template
//! resolution, so this is not a Dockerfile parser in general: it joins line
//! continuations, drops comments, expands `ARG` defaults declared before the
//! first `FROM`, and returns the image named by that `FROM`.

use log::trace;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::BuildSpec;
use crate::error::{Error, Result};

const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Resolves and reads the Dockerfile of a build.
pub trait DockerfileSource {
    fn dockerfile_path(&self, build: &BuildSpec) -> PathBuf;
    fn read_dockerfile(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads Dockerfiles from disk, resolving build contexts against `root`.
#[derive(Debug, Clone)]
pub struct FsDockerfileSource {
    root: PathBuf,
}

impl FsDockerfileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DockerfileSource for FsDockerfileSource {
    fn dockerfile_path(&self, build: &BuildSpec) -> PathBuf {
        self.root
            .join(&build.context)
            .join(build.dockerfile.as_deref().unwrap_or(DEFAULT_DOCKERFILE))
    }

    fn read_dockerfile(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// The facts extracted from one Dockerfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dockerfile {
    pub path: PathBuf,
    pub base_image: String,
}

/// Joins continuation lines and strips comments and blank lines.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for raw in content.lines() {
        let trimmed = raw.trim();
        if current.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }
        // Comments inside a continued instruction are skipped too
        if !current.is_empty() && trimmed.starts_with('#') {
            continue;
        }
        match trimmed.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head.trim_end());
                current.push(' ');
            }
            None => {
                current.push_str(trimmed);
                lines.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }
    lines
}

fn split_instruction(line: &str) -> (String, &str) {
    match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword.to_ascii_uppercase(), rest.trim()),
        None => (line.to_ascii_uppercase(), ""),
    }
}

fn expand_args(value: &str, args: &HashMap<String, String>) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")?;
    Ok(re
        .replace_all(value, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            args.get(name).cloned().unwrap_or_default()
        })
        .into_owned())
}

/// Returns the base image of the first `FROM` instruction, if any.
///
/// `--platform=...` flags and `AS <stage>` aliases are ignored. `ARG`
/// defaults declared before the first `FROM` are substituted.
pub fn parse_base_image(content: &str) -> Result<Option<String>> {
    let mut args = HashMap::new();

    for line in logical_lines(content) {
        let (keyword, rest) = split_instruction(&line);
        match keyword.as_str() {
            "ARG" => {
                if let Some((name, default)) = rest.split_once('=') {
                    let default = default.trim().trim_matches('"').to_string();
                    args.insert(name.trim().to_string(), default);
                }
            }
            "FROM" => {
                let image = rest
                    .split_whitespace()
                    .find(|token| !token.starts_with("--"));
                return match image {
                    Some(image) => Ok(Some(expand_args(image, &args)?)),
                    None => Ok(None),
                };
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Reads the Dockerfile of `build` and extracts its base image.
pub fn load(source: &dyn DockerfileSource, build: &BuildSpec) -> Result<Dockerfile> {
    let path = source.dockerfile_path(build);
    let fail = |message: &str| Error::Dockerfile {
        path: path.display().to_string(),
        message: message.to_string(),
    };

    let content = source
        .read_dockerfile(&path)
        .map_err(|e| fail(&format!("cannot be read ({})", e)))?;
    if content.trim().is_empty() {
        return Err(fail("file is empty"));
    }

    let base_image = parse_base_image(&content)?
        .filter(|image| !image.is_empty())
        .ok_or_else(|| fail("no base image found (missing FROM instruction)"))?;

    trace!("{} is based on {}", path.display(), base_image);
    Ok(Dockerfile { path, base_image })
}

/// Splits an image reference into repository and tag.
///
/// The tag is everything after the last `:` that follows the last `/`, so
/// registry ports are not mistaken for tags. Digests are dropped.
pub fn split_image(reference: &str) -> (&str, Option<&str>) {
    let reference = reference.split('@').next().unwrap_or(reference);
    let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    match reference[name_start..].rfind(':') {
        Some(i) => {
            let at = name_start + i;
            (&reference[..at], Some(&reference[at + 1..]))
        }
        None => (reference, None),
    }
}
