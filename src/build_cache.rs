//! # Build Cache Validation
//!
//! Decides, for every resolved template, whether the existing image can be
//! reused. Two facts are needed per template and both come from external
//! collaborators:
//!
//! - the creation time of the image, from an [`ImageInspector`]
//! - the commit times of the template Dockerfile, from a [`SourceHistory`]
//!
//! The verdict only depends on these facts, never on the current time, so
//! evaluating the same facts twice always gives the same answer.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fmt;
use std::path::Path;

use crate::builds::BuildGraph;
use crate::error::{Error, Result};

/// Freshness of a template image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Stale,
    Missing,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// Verdict for one template image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVerdict {
    pub image: String,
    pub status: CacheStatus,
    pub reason: String,
    pub image_created: Option<DateTime<Utc>>,
    pub last_commit: Option<DateTime<Utc>>,
}

/// How missing and stale templates are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Validation only: a missing image is fatal.
    CheckOnly,
    /// Missing images are scheduled for build.
    #[default]
    AllowBuild,
    /// Every template is rebuilt, whatever its verdict.
    Force,
}

/// Source of image creation times.
pub trait ImageInspector {
    /// Creation time of `image`, or `None` when it does not exist locally.
    fn created(&self, image: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Source of commit times touching a file.
pub trait SourceHistory {
    fn commit_times(&self, path: &Path) -> Result<Vec<DateTime<Utc>>>;
}

/// Computes the verdict of one image from its facts.
pub fn evaluate(
    image: &str,
    image_created: Option<DateTime<Utc>>,
    commits: &[DateTime<Utc>],
) -> CacheVerdict {
    let last_commit = commits.iter().max().copied();

    let (status, reason) = match (image_created, last_commit) {
        (None, _) => (CacheStatus::Missing, "image not found".to_string()),
        (Some(created), Some(commit)) if commit > created => (
            CacheStatus::Stale,
            format!(
                "built on {}, template modified on {}",
                created.format("%Y-%m-%d %H:%M:%S"),
                commit.format("%Y-%m-%d %H:%M:%S")
            ),
        ),
        (Some(_), Some(_)) => (CacheStatus::Fresh, "image is up to date".to_string()),
        (Some(_), None) => (
            CacheStatus::Fresh,
            "template has no commit history".to_string(),
        ),
    };

    CacheVerdict {
        image: image.to_string(),
        status,
        reason,
        image_created,
        last_commit,
    }
}

/// Result of validating a build graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    /// One verdict per graph entry, in graph order.
    pub verdicts: Vec<CacheVerdict>,
    /// Images to build, in graph order.
    pub to_build: Vec<String>,
    /// Advisory messages for the user.
    pub warnings: Vec<String>,
}

impl BuildPlan {
    pub fn verdict(&self, image: &str) -> Option<&CacheVerdict> {
        self.verdicts.iter().find(|v| v.image == image)
    }
}

/// Evaluates every graph entry and decides what must be built.
pub fn validate(
    graph: &BuildGraph,
    images: &dyn ImageInspector,
    history: &dyn SourceHistory,
    mode: BuildMode,
) -> Result<BuildPlan> {
    let mut plan = BuildPlan::default();
    let mut missing = Vec::new();

    for (image, template) in graph {
        let created = images.created(image)?;
        let commits = history.commit_times(&template.dockerfile)?;
        let verdict = evaluate(image, created, &commits);
        debug!("(CHECKED) {} is {}: {}", image, verdict.status, verdict.reason);

        match (mode, verdict.status) {
            (BuildMode::Force, _) => plan.to_build.push(image.clone()),
            (_, CacheStatus::Fresh) => {}
            (_, CacheStatus::Stale) => {
                let message = format!(
                    "Obsolete image {}: {}. Add --force-build to rebuild it",
                    image, verdict.reason
                );
                warn!("{}", message);
                plan.warnings.push(message);
            }
            (BuildMode::CheckOnly, CacheStatus::Missing) => missing.push(image.clone()),
            (BuildMode::AllowBuild, CacheStatus::Missing) => {
                plan.to_build.push(image.clone());
            }
        }
        plan.verdicts.push(verdict);
    }

    if !missing.is_empty() {
        return Err(Error::BuildCacheMissing { images: missing });
    }
    Ok(plan)
}
