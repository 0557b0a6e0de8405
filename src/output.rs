//! # Output Configuration
//!
//! This module controls how reports are printed: colors and emoji markers
//! follow terminal capabilities and user preferences, and the `render_*`
//! helpers turn pipeline results into the lines shown by the CLI.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blueprint::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//! println!("{} Checking project...", emoji(&config, "🔍", "[CHECK]"));
//! ```

use std::env;

use crate::activation::ActiveServiceSet;
use crate::build_cache::{BuildPlan, CacheStatus};
use crate::repository::RepositoryReport;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// `--color=always` overrides `NO_COLOR`, `--color=never` disables
    /// colors, anything else detects support from the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain marker otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// One line per repository, followed by its warnings.
pub fn render_repositories(config: &OutputConfig, reports: &[RepositoryReport]) -> Vec<String> {
    let mut lines = Vec::new();
    for report in reports {
        let state = &report.state;
        let marker = if report.warnings.is_empty() {
            emoji(config, "✅", "[OK]")
        } else {
            emoji(config, "⚠️ ", "[WARN]")
        };
        let mut line = format!(
            "{} {} ({})",
            marker,
            state.name,
            state.active_branch.as_deref().unwrap_or("detached")
        );
        if report.cloned {
            line.push_str(", cloned");
        }
        if report.updated {
            line.push_str(", updated");
        }
        lines.push(line);
        lines.extend(report.warnings.iter().map(|w| format!("    {}", w)));
    }
    lines
}

pub fn render_active(config: &OutputConfig, active: &ActiveServiceSet) -> String {
    format!(
        "{} Active services: {}",
        emoji(config, "🐳", "[SERVICES]"),
        active.join(", ")
    )
}

/// One line per template image with its cache verdict.
pub fn render_build_plan(config: &OutputConfig, plan: &BuildPlan) -> Vec<String> {
    plan.verdicts
        .iter()
        .map(|verdict| {
            let marker = match verdict.status {
                CacheStatus::Fresh => emoji(config, "✅", "[OK]"),
                CacheStatus::Stale => emoji(config, "⚠️ ", "[STALE]"),
                CacheStatus::Missing => emoji(config, "❌", "[MISSING]"),
            };
            let scheduled = if plan.to_build.contains(&verdict.image) {
                " (to build)"
            } else {
                ""
            };
            format!(
                "{} {} {}: {}{}",
                marker, verdict.image, verdict.status, verdict.reason, scheduled
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_cache::CacheVerdict;
    use crate::repository::{RepositorySpec, RepositoryState, SyncWarning};
    use std::path::PathBuf;

    fn report(warnings: Vec<SyncWarning>) -> RepositoryReport {
        let spec = RepositorySpec {
            name: "http-api".to_string(),
            path: PathBuf::from("submodules/http-api"),
            url: "https://github.com/rapydo/http-api.git".to_string(),
            branch: "main".to_string(),
        };
        let mut state = RepositoryState::new(&spec, PathBuf::from("/p/submodules/http-api"));
        state.active_branch = Some("main".to_string());
        RepositoryReport {
            state,
            warnings,
            updated: false,
            cloned: false,
        }
    }

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "🔍", "[CHECK]"), "🔍");
        assert_eq!(emoji(&OutputConfig::without_color(), "🔍", "[CHECK]"), "[CHECK]");
    }

    #[test]
    fn test_render_repositories() {
        let config = OutputConfig::without_color();
        let lines = render_repositories(&config, &[report(vec![SyncWarning::FetchSkipped])]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "[WARN] http-api (main)");
        assert!(lines[1].starts_with("    "));

        let lines = render_repositories(&config, &[report(vec![])]);
        assert_eq!(lines, vec!["[OK] http-api (main)"]);
    }

    #[test]
    fn test_render_build_plan() {
        let plan = BuildPlan {
            verdicts: vec![CacheVerdict {
                image: "rapydo/backend:template".to_string(),
                status: CacheStatus::Missing,
                reason: "image not found".to_string(),
                image_created: None,
                last_commit: None,
            }],
            to_build: vec!["rapydo/backend:template".to_string()],
            warnings: vec![],
        };
        let lines = render_build_plan(&OutputConfig::without_color(), &plan);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[MISSING] rapydo/backend:template"));
        assert!(lines[0].ends_with("(to build)"));
    }
}
