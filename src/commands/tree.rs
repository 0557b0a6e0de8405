//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays the active
//! services of a blueprint as a dependency tree. Services that no other
//! active service depends on are the roots; each node lists its
//! `depends_on` entries. Services built from a template show the template
//! image they derive from.
//!
//! Repositories are not synchronized and placeholders are not checked, so
//! the command also works on a project that is not fully configured yet.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::collections::BTreeSet;

use blueprint::output::{emoji, OutputConfig};
use blueprint::pipeline::{Action, Deployment, Settings};

/// Display the dependency tree of the active services
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Maximum depth to display in the tree.
    ///
    /// Use 0 to show only the root services.
    #[arg(long, value_name = "NUM")]
    pub depth: Option<usize>,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs, settings: &Settings, output: &OutputConfig) -> Result<()> {
    let (_, deployment) = super::prepare(settings, Action::Tree)?;
    println!(
        "{} Service tree for blueprint: {}",
        emoji(output, "🌳", "[TREE]"),
        deployment.blueprint
    );

    let tree = build_tree(&deployment, args.depth.unwrap_or(usize::MAX));
    print_tree(&tree).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    Ok(())
}

/// Root services: active services no other active service depends on.
fn roots(deployment: &Deployment) -> Vec<String> {
    let services = &deployment.config.services;
    let required: BTreeSet<&str> = deployment
        .active
        .iter()
        .filter_map(|name| services.get(name))
        .flat_map(|s| s.depends_on.iter().map(String::as_str))
        .collect();

    let roots: Vec<String> = deployment
        .active
        .iter()
        .filter(|name| !required.contains(name))
        .map(str::to_string)
        .collect();

    // Every active service sits on a cycle
    if roots.is_empty() {
        deployment.active.as_slice().to_vec()
    } else {
        roots
    }
}

fn build_tree(deployment: &Deployment, max_depth: usize) -> TreeNode {
    let children = roots(deployment)
        .iter()
        .map(|name| build_node(deployment, name, max_depth, 0, &mut Vec::new()))
        .collect();
    TreeNode {
        label: deployment.blueprint.clone(),
        children,
    }
}

fn label(deployment: &Deployment, name: &str) -> String {
    let service = deployment.config.services.get(name);
    let mut label = name.to_string();
    if let Some(image) = service.and_then(|s| s.image.as_deref()) {
        label.push_str(&format!(" [{}]", image));
    }
    if let Some(o) = deployment
        .builds
        .overrides
        .iter()
        .find(|o| o.service == name)
    {
        label.push_str(&format!(" <- {}", o.template));
    }
    label
}

fn build_node(
    deployment: &Deployment,
    name: &str,
    max_depth: usize,
    depth: usize,
    path: &mut Vec<String>,
) -> TreeNode {
    let label = label(deployment, name);
    if path.iter().any(|p| p == name) {
        return TreeNode {
            label: format!("{} (cycle)", label),
            children: vec![],
        };
    }
    let dependencies = deployment
        .config
        .services
        .get(name)
        .map(|s| s.depends_on.clone())
        .unwrap_or_default();
    if depth >= max_depth || dependencies.is_empty() {
        return TreeNode {
            label,
            children: vec![],
        };
    }

    path.push(name.to_string());
    let children = dependencies
        .iter()
        .map(|dep| build_node(deployment, dep, max_depth, depth + 1, path))
        .collect();
    path.pop();
    TreeNode { label, children }
}

/// Tree node structure for ptree visualization
#[derive(Clone)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
