//! # Repository Synchronization
//!
//! This module provides the `RepositorySyncManager`, which keeps the
//! project's submodules consistent with the remote URL and branch the project
//! configuration expects, and reports how far they drifted.
//!
//! ## Design
//!
//! The manager never talks to git directly. Every fact (remote URL, active
//! branch, ahead/behind commits, unstaged files) comes from a
//! **`GitOperations`** implementation. `DefaultGitOperations` wraps the
//! system `git` command through the free functions of [`crate::git`]; tests
//! swap in a mock so the whole protocol can be exercised without a real
//! repository or network access.
//!
//! ## Protocol
//!
//! Each repository goes through the same stages:
//!
//! 1.  **Unverified → UrlChecked**: the `origin` URL must match the expected
//!     one, ignoring credentials. A mismatch is fatal.
//! 2.  **UrlChecked → BranchChecked**: the checked-out branch must be the
//!     expected one. A mismatch is fatal.
//! 3.  **BranchChecked → Fetched | FetchSkipped**: when fetching is allowed,
//!     the remote is fetched and the commits behind and ahead of the remote
//!     branch are reported, each one as a warning.
//! 4.  **→ Reported**: unstaged files are reported. An update pulls the
//!     tracked branch only when nothing is unstaged.

use log::{debug, info, warn};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::defaults::{MAX_REPORTED_COMMITS, ORIGIN_REMOTE, UPSTREAM_REMOTE};
use crate::error::{Error, Result};
pub use crate::git::{CommitSummary, UnstagedFiles};
use crate::suggestions;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Whether `path` holds a git working tree.
    fn exists(&self, path: &Path) -> bool;

    /// Clones `url` at `branch` into `path`.
    fn clone_branch(&self, url: &str, branch: &str, path: &Path) -> Result<()>;

    /// URL of a remote, `None` when it is not configured.
    fn remote_url(&self, path: &Path, remote: &str) -> Result<Option<String>>;

    /// Adds a remote, or replaces its URL when it already exists.
    fn set_remote(&self, path: &Path, remote: &str, url: &str) -> Result<()>;

    /// Checked-out branch, `None` on a detached HEAD.
    fn active_branch(&self, path: &Path) -> Result<Option<String>>;

    fn fetch(&self, path: &Path, remote: &str) -> Result<()>;

    fn remote_branch_exists(&self, path: &Path, remote: &str, branch: &str) -> Result<bool>;

    /// At most `max` commits of a `from..to` range.
    fn commits(&self, path: &Path, range: &str, max: usize) -> Result<Vec<CommitSummary>>;

    fn unstaged_files(&self, path: &Path) -> Result<UnstagedFiles>;

    fn pull(&self, path: &Path, remote: &str, branch: &str) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn exists(&self, path: &Path) -> bool {
        crate::git::is_repository(path)
    }

    fn clone_branch(&self, url: &str, branch: &str, path: &Path) -> Result<()> {
        crate::git::clone_branch(url, branch, path)
    }

    fn remote_url(&self, path: &Path, remote: &str) -> Result<Option<String>> {
        crate::git::remote_url(path, remote)
    }

    fn set_remote(&self, path: &Path, remote: &str, url: &str) -> Result<()> {
        match crate::git::remote_url(path, remote)? {
            Some(_) => crate::git::set_remote_url(path, remote, url),
            None => crate::git::add_remote(path, remote, url),
        }
    }

    fn active_branch(&self, path: &Path) -> Result<Option<String>> {
        crate::git::active_branch(path)
    }

    fn fetch(&self, path: &Path, remote: &str) -> Result<()> {
        crate::git::fetch(path, remote)
    }

    fn remote_branch_exists(&self, path: &Path, remote: &str, branch: &str) -> Result<bool> {
        crate::git::remote_branch_exists(path, remote, branch)
    }

    fn commits(&self, path: &Path, range: &str, max: usize) -> Result<Vec<CommitSummary>> {
        crate::git::commits(path, range, max)
    }

    fn unstaged_files(&self, path: &Path) -> Result<UnstagedFiles> {
        crate::git::unstaged_files(path)
    }

    fn pull(&self, path: &Path, remote: &str, branch: &str) -> Result<()> {
        crate::git::pull(path, remote, branch)
    }
}

/// A repository the project expects, as declared in its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    pub name: String,
    /// Location, relative to the manager root unless absolute.
    pub path: PathBuf,
    pub url: String,
    pub branch: String,
}

/// Progress of a repository through the sync protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncStage {
    Unverified,
    UrlChecked,
    BranchChecked,
    FetchSkipped,
    Fetched,
    Reported,
}

/// Facts gathered about one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub name: String,
    pub path: PathBuf,
    pub remote_url: Option<String>,
    pub expected_url: String,
    pub expected_branch: String,
    pub active_branch: Option<String>,
    pub behind: Vec<CommitSummary>,
    pub ahead: Vec<CommitSummary>,
    pub unstaged: UnstagedFiles,
    /// `None` until a fetch happened.
    pub remote_branch_found: Option<bool>,
    pub stage: SyncStage,
}

impl RepositoryState {
    pub(crate) fn new(spec: &RepositorySpec, path: PathBuf) -> Self {
        Self {
            name: spec.name.clone(),
            path,
            remote_url: None,
            expected_url: spec.url.clone(),
            expected_branch: spec.branch.clone(),
            active_branch: None,
            behind: Vec::new(),
            ahead: Vec::new(),
            unstaged: UnstagedFiles::default(),
            remote_branch_found: None,
            stage: SyncStage::Unverified,
        }
    }
}

/// Advisory conditions found while syncing. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncWarning {
    /// A remote commit not yet pulled.
    Behind(CommitSummary),
    /// A local commit not yet pushed.
    Ahead(CommitSummary),
    /// The tracked branch does not exist on the remote.
    RemoteBranchMissing { branch: String },
    /// Remote checks were skipped (offline run or `--skip-network`).
    FetchSkipped,
    /// Talking to the remote failed; the message is the git error.
    FetchFailed(String),
    DetachedHead,
    Unstaged(UnstagedFiles),
    /// An update was requested but unstaged files block it.
    UpdateBlocked,
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::Behind(c) => write!(f, "missing commit {} ({})", c.sha, c.message),
            SyncWarning::Ahead(c) => write!(f, "unpushed commit {} ({})", c.sha, c.message),
            SyncWarning::RemoteBranchMissing { branch } => write!(
                f,
                "remote branch {}/{} not found, is it a local branch?",
                ORIGIN_REMOTE, branch
            ),
            SyncWarning::FetchSkipped => write!(f, "remote checks skipped"),
            SyncWarning::FetchFailed(message) => {
                write!(f, "unable to verify remote updates: {}", message)
            }
            SyncWarning::DetachedHead => write!(f, "detached HEAD, unable to verify updates"),
            SyncWarning::Unstaged(files) => {
                write!(f, "{} unstaged file(s)", files.len())?;
                for file in &files.changed {
                    write!(f, "\n\tchanged:   {}", file)?;
                }
                for file in &files.untracked {
                    write!(f, "\n\tuntracked: {}", file)?;
                }
                Ok(())
            }
            SyncWarning::UpdateBlocked => {
                write!(f, "unable to update, you have unstaged files")
            }
        }
    }
}

/// Outcome of syncing one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReport {
    pub state: RepositoryState,
    pub warnings: Vec<SyncWarning>,
    /// Whether a pull was performed.
    pub updated: bool,
    /// Whether the repository was cloned in this run.
    pub cloned: bool,
}

/// What a sync pass is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    /// Contact the remote (fetch and compare).
    pub fetch: bool,
    /// Pull the tracked branch when possible.
    pub update: bool,
    /// Clone missing repositories.
    pub initialize: bool,
}

/// Drives the sync protocol over a set of repositories.
pub struct RepositorySyncManager {
    git: Arc<dyn GitOperations>,
    root: PathBuf,
}

impl RepositorySyncManager {
    /// Creates a manager using the system `git`, resolving relative
    /// repository paths against `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            git: Arc::new(DefaultGitOperations),
            root: root.into(),
        }
    }

    /// Creates a manager with a custom `GitOperations` implementation.
    pub fn with_operations(git: Arc<dyn GitOperations>, root: impl Into<PathBuf>) -> Self {
        Self {
            git,
            root: root.into(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Syncs every spec not listed in `excluded`, in the given order.
    pub fn sync_all(
        &self,
        specs: &[RepositorySpec],
        excluded: &[String],
        options: SyncOptions,
    ) -> Result<Vec<RepositoryReport>> {
        let mut reports = Vec::with_capacity(specs.len());
        for spec in specs {
            if excluded.iter().any(|name| name == &spec.name) {
                info!("Skipping repository {} as requested", spec.name);
                continue;
            }
            reports.push(self.sync(spec, options)?);
        }
        Ok(reports)
    }

    /// Runs the full protocol on one repository.
    pub fn sync(&self, spec: &RepositorySpec, options: SyncOptions) -> Result<RepositoryReport> {
        let path = self.resolve(&spec.path);
        let mut report = RepositoryReport {
            state: RepositoryState::new(spec, path.clone()),
            warnings: Vec::new(),
            updated: false,
            cloned: false,
        };

        if !self.git.exists(&path) {
            if !options.initialize {
                return Err(Error::RepoSync {
                    repo: spec.name.clone(),
                    message: format!("repository missing at {}", path.display()),
                    hint: Some(suggestions::run_init()),
                });
            }
            info!("Cloning {}@{} into {}", spec.url, spec.branch, path.display());
            self.git.clone_branch(&spec.url, &spec.branch, &path)?;
            report.cloned = true;
        }

        self.check_url(&mut report.state)?;
        self.check_branch(&mut report)?;

        if options.fetch && report.state.active_branch.is_some() {
            self.check_remote(&mut report);
        } else {
            report.state.stage = SyncStage::FetchSkipped;
            if !options.fetch {
                report.warnings.push(SyncWarning::FetchSkipped);
            }
        }

        let unstaged = self.git.unstaged_files(&path)?;
        if !unstaged.is_empty() {
            report.warnings.push(SyncWarning::Unstaged(unstaged.clone()));
        }
        report.state.unstaged = unstaged;

        if options.update {
            self.update(&mut report)?;
        }

        report.state.stage = SyncStage::Reported;
        for warning in &report.warnings {
            warn!("{}: {}", spec.name, warning);
        }
        Ok(report)
    }

    fn check_url(&self, state: &mut RepositoryState) -> Result<()> {
        let found = self.git.remote_url(&state.path, ORIGIN_REMOTE)?;
        let matches = found
            .as_deref()
            .is_some_and(|url| urls_match(url, &state.expected_url));

        if !matches {
            return Err(Error::RepoSync {
                repo: state.name.clone(),
                message: format!(
                    "unmatched local remote\nFound: {}\nExpected: {}",
                    found.as_deref().unwrap_or("<none>"),
                    state.expected_url
                ),
                hint: Some(suggestions::reclone(&state.path)),
            });
        }

        debug!("(CHECKED) {} remote is {}", state.name, state.expected_url);
        state.remote_url = found;
        state.stage = SyncStage::UrlChecked;
        Ok(())
    }

    fn check_branch(&self, report: &mut RepositoryReport) -> Result<()> {
        let state = &mut report.state;
        let active = self.git.active_branch(&state.path)?;
        match active.as_deref() {
            Some(branch) if branch != state.expected_branch => {
                return Err(Error::RepoSync {
                    repo: state.name.clone(),
                    message: format!(
                        "wrong branch {}, expected {}",
                        branch, state.expected_branch
                    ),
                    hint: Some(suggestions::checkout(&state.path, &state.expected_branch)),
                });
            }
            Some(branch) => debug!("(CHECKED) {} is on branch {}", state.name, branch),
            None => report.warnings.push(SyncWarning::DetachedHead),
        }
        state.active_branch = active;
        state.stage = SyncStage::BranchChecked;
        Ok(())
    }

    /// Fetches and compares with the remote branch. Failures here only
    /// downgrade the report to a warning.
    fn check_remote(&self, report: &mut RepositoryReport) {
        let state = &mut report.state;
        let branch = state.expected_branch.clone();

        if let Err(e) = self.git.fetch(&state.path, ORIGIN_REMOTE) {
            state.stage = SyncStage::FetchSkipped;
            report.warnings.push(SyncWarning::FetchFailed(e.to_string()));
            return;
        }
        state.stage = SyncStage::Fetched;

        let found = match self
            .git
            .remote_branch_exists(&state.path, ORIGIN_REMOTE, &branch)
        {
            Ok(found) => found,
            Err(e) => {
                report.warnings.push(SyncWarning::FetchFailed(e.to_string()));
                return;
            }
        };
        state.remote_branch_found = Some(found);
        if !found {
            report
                .warnings
                .push(SyncWarning::RemoteBranchMissing { branch });
            return;
        }

        match self.diverging_commits(&state.path, &branch) {
            Ok((behind, ahead)) => {
                state.behind = behind;
                state.ahead = ahead;
            }
            Err(e) => {
                report.warnings.push(SyncWarning::FetchFailed(e.to_string()));
                return;
            }
        }

        if state.behind.is_empty() {
            debug!("(CHECKED) {} repo is updated", state.name);
        }
        report
            .warnings
            .extend(state.behind.iter().cloned().map(SyncWarning::Behind));
        report
            .warnings
            .extend(state.ahead.iter().cloned().map(SyncWarning::Ahead));
    }

    /// Commits behind and ahead of the remote branch.
    fn diverging_commits(
        &self,
        path: &Path,
        branch: &str,
    ) -> Result<(Vec<CommitSummary>, Vec<CommitSummary>)> {
        let remote_branch = format!("{}/{}", ORIGIN_REMOTE, branch);
        let behind = self.git.commits(
            path,
            &format!("{}..{}", branch, remote_branch),
            MAX_REPORTED_COMMITS,
        )?;
        let ahead = self.git.commits(
            path,
            &format!("{}..{}", remote_branch, branch),
            MAX_REPORTED_COMMITS,
        )?;
        Ok((behind, ahead))
    }

    fn update(&self, report: &mut RepositoryReport) -> Result<()> {
        if !report.state.unstaged.is_empty() {
            report.warnings.push(SyncWarning::UpdateBlocked);
            return Ok(());
        }
        let Some(branch) = report.state.active_branch.clone() else {
            return Ok(());
        };
        info!("Updating {}@{}", report.state.name, branch);
        self.git.pull(&report.state.path, ORIGIN_REMOTE, &branch)?;
        report.updated = true;
        Ok(())
    }

    /// Verifies the `upstream` remote of the repository at `path`.
    ///
    /// When `initialize` is set, a missing or different remote is
    /// (re)configured; otherwise it is fatal.
    pub fn check_upstream(&self, path: &Path, expected_url: &str, initialize: bool) -> Result<()> {
        let path = self.resolve(path);
        let found = self.git.remote_url(&path, UPSTREAM_REMOTE)?;
        match found {
            Some(url) if urls_match(&url, expected_url) => {
                debug!("(CHECKED) Upstream is set correctly");
                Ok(())
            }
            _ if initialize => {
                self.git.set_remote(&path, UPSTREAM_REMOTE, expected_url)?;
                info!("Set remote {}: {}", UPSTREAM_REMOTE, expected_url);
                Ok(())
            }
            found => Err(Error::RepoSync {
                repo: UPSTREAM_REMOTE.to_string(),
                message: format!(
                    "upstream misconfiguration\nFound: {}\nExpected: {}",
                    found.as_deref().unwrap_or("<none>"),
                    expected_url
                ),
                hint: Some(suggestions::run_init()),
            }),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RemoteLocation {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
}

fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

fn parse_remote(raw: &str) -> Option<RemoteLocation> {
    if !raw.contains("://") {
        // scp-like syntax: [user@]host:path
        let scp = Regex::new(r"^(?:[^@/]+@)?([^:/]+):(.+)$").ok()?;
        let caps = scp.captures(raw)?;
        return Some(RemoteLocation {
            scheme: "ssh".to_string(),
            host: caps[1].to_ascii_lowercase(),
            port: Some(22),
            path: normalize_path(&caps[2]),
        });
    }

    let url = Url::parse(raw).ok()?;
    Some(RemoteLocation {
        scheme: url.scheme().to_string(),
        host: url.host_str()?.to_ascii_lowercase(),
        port: url
            .port_or_known_default()
            .or_else(|| (url.scheme() == "ssh").then_some(22)),
        path: normalize_path(url.path()),
    })
}

/// Whether two remote URLs designate the same repository.
///
/// Credentials are ignored. Scheme, host, port and path must match exactly.
/// URLs that cannot be parsed (local paths) are compared verbatim.
pub fn urls_match(found: &str, expected: &str) -> bool {
    if found == expected {
        return true;
    }
    match (parse_remote(found), parse_remote(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
