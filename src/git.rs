//! Thin wrappers around the system `git` command.
//!
//! Every function runs `git -C <dir> ...` and maps failures to
//! `Error::GitCommand`. Using the system binary means SSH keys, credential
//! helpers and any authentication configured in `~/.gitconfig` just work.

use chrono::{DateTime, TimeZone, Utc};
use log::trace;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use crate::build_cache::SourceHistory;
use crate::defaults::MAX_COMMIT_MESSAGE;
use crate::error::{Error, Result};

/// One commit, as shown in ahead/behind reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    /// Abbreviated hash (7 characters).
    pub sha: String,
    /// First line of the message, truncated for display.
    pub message: String,
}

impl CommitSummary {
    pub fn new(sha: &str, message: &str) -> Self {
        Self {
            sha: sha.chars().take(7).collect(),
            message: truncate_message(message.trim()),
        }
    }
}

/// Files that prevent a repository from being updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnstagedFiles {
    pub changed: Vec<String>,
    pub untracked: Vec<String>,
}

impl UnstagedFiles {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.untracked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed.len() + self.untracked.len()
    }
}

/// Truncates `message` to `MAX_COMMIT_MESSAGE` characters, ellipsis included.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_COMMIT_MESSAGE {
        return message.to_string();
    }
    let head: String = message.chars().take(MAX_COMMIT_MESSAGE - 3).collect();
    format!("{}...", head)
}

fn run(dir: &Path, args: &[&str]) -> Result<Output> {
    trace!("git -C {} {}", dir.display(), args.join(" "));
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| Error::GitCommand {
            command: args.join(" "),
            path: dir.display().to_string(),
            stderr: e.to_string(),
        })
}

/// Runs git and returns trimmed stdout, failing on a non-zero exit.
fn run_checked(dir: &Path, args: &[&str]) -> Result<String> {
    let output = run(dir, args)?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: args.join(" "),
            path: dir.display().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Whether `dir` is the root of a git working tree.
pub fn is_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// URL of `remote`, or `None` when the remote is not configured.
pub fn remote_url(dir: &Path, remote: &str) -> Result<Option<String>> {
    let output = run(dir, &["remote", "get-url", remote])?;
    if !output.status.success() {
        return Ok(None);
    }
    let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok((!url.is_empty()).then_some(url))
}

pub fn add_remote(dir: &Path, remote: &str, url: &str) -> Result<()> {
    run_checked(dir, &["remote", "add", remote, url]).map(|_| ())
}

pub fn set_remote_url(dir: &Path, remote: &str, url: &str) -> Result<()> {
    run_checked(dir, &["remote", "set-url", remote, url]).map(|_| ())
}

/// Checked-out branch, or `None` on a detached HEAD.
pub fn active_branch(dir: &Path) -> Result<Option<String>> {
    let branch = run_checked(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok((branch != "HEAD" && !branch.is_empty()).then_some(branch))
}

pub fn fetch(dir: &Path, remote: &str) -> Result<()> {
    run_checked(dir, &["fetch", "--quiet", remote]).map(|_| ())
}

/// Whether `remote/branch` is known locally (after a fetch).
pub fn remote_branch_exists(dir: &Path, remote: &str, branch: &str) -> Result<bool> {
    let reference = format!("refs/remotes/{}/{}", remote, branch);
    let output = run(dir, &["rev-parse", "--verify", "--quiet", &reference])?;
    Ok(output.status.success())
}

/// Commits in `range` (e.g. `main..origin/main`), newest first.
pub fn commits(dir: &Path, range: &str, max: usize) -> Result<Vec<CommitSummary>> {
    let max_count = format!("--max-count={}", max);
    let stdout = run_checked(dir, &["log", &max_count, "--format=%H%x09%s", range, "--"])?;
    Ok(parse_log(&stdout))
}

fn parse_log(stdout: &str) -> Vec<CommitSummary> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match line.split_once('\t') {
            Some((sha, subject)) => CommitSummary::new(sha, subject),
            None => CommitSummary::new(line, ""),
        })
        .collect()
}

/// Changed and untracked files, from `git status --porcelain`.
pub fn unstaged_files(dir: &Path) -> Result<UnstagedFiles> {
    let stdout = run_checked(dir, &["status", "--porcelain"])?;
    Ok(parse_status(&stdout))
}

fn parse_status(stdout: &str) -> UnstagedFiles {
    let mut files = UnstagedFiles::default();
    for line in stdout.lines() {
        if line.len() < 4 {
            continue;
        }
        let (code, path) = line.split_at(3);
        let path = path.to_string();
        if code.starts_with("??") {
            files.untracked.push(path);
        } else {
            files.changed.push(path);
        }
    }
    files
}

pub fn pull(dir: &Path, remote: &str, branch: &str) -> Result<()> {
    run_checked(dir, &["pull", "--quiet", remote, branch]).map(|_| ())
}

/// Clones `url` into `target`, checking out `branch`.
pub fn clone_branch(url: &str, branch: &str, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let target_str = target.display().to_string();
    run_checked(
        Path::new("."),
        &["clone", "--quiet", "--branch", branch, url, &target_str],
    )
    .map(|_| ())
}

/// Commit times of every commit touching `file`.
///
/// A file outside any repository has no history.
pub fn commit_times(file: &Path) -> Result<Vec<DateTime<Utc>>> {
    let (Some(dir), Some(name)) = (file.parent(), file.file_name()) else {
        return Ok(Vec::new());
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let name = name.to_string_lossy();
    let output = run(dir, &["log", "--format=%ct", "--", &name])?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            return Ok(Vec::new());
        }
        return Err(Error::GitCommand {
            command: "log --format=%ct".to_string(),
            path: dir.display().to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(parse_timestamps(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_timestamps(stdout: &str) -> Vec<DateTime<Utc>> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<i64>().ok())
        .filter_map(|secs| Utc.timestamp_opt(secs, 0).single())
        .collect()
}

/// [`SourceHistory`] backed by `git log`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitHistory;

impl SourceHistory for GitHistory {
    fn commit_times(&self, path: &Path) -> Result<Vec<DateTime<Utc>>> {
        commit_times(path)
    }
}
