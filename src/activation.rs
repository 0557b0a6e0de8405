//! # Active Service Resolution
//!
//! A deployment only includes the services a blueprint actually needs: the
//! ones explicitly activated through their `ACTIVATE` environment flag, plus
//! everything they transitively depend on.
//!
//! ## Process
//!
//! 1.  **Arena**: Services are laid out in a vector (sorted by name) and every
//!     `depends_on` edge is turned into an index into that vector. An edge to
//!     an unknown service is a configuration error.
//!
//! 2.  **Roots**: Services whose `ACTIVATE` flag is truthy seed the worklist.
//!     An empty root set is a configuration error.
//!
//! 3.  **Closure**: The worklist is drained breadth-first. Each index is
//!     marked visited before its edges are followed, so dependency cycles
//!     terminate.
//!
//! 4.  **Placeholder gate**: Once the active set is known, every environment
//!     value of an active service is scanned for the placeholder sentinel.
//!     All offending keys are reported together.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::config::ServiceMap;
use crate::defaults::{ACTIVATE_KEY, PLACEHOLDER};
use crate::error::{Error, Result};
use crate::suggestions;

/// Ordered, duplicate-free list of active service names.
///
/// Roots come first in name order, followed by their dependencies in
/// discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActiveServiceSet {
    names: Vec<String>,
}

impl ActiveServiceSet {
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }

    /// Names joined with `sep`, in set order.
    pub fn join(&self, sep: &str) -> String {
        self.names.join(sep)
    }
}

/// Whether an `ACTIVATE`-style flag value enables a service.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Whether an environment value still holds the placeholder sentinel.
pub fn is_placeholder(value: &str) -> bool {
    value.contains(PLACEHOLDER)
}

/// Services explicitly activated, sorted by name.
pub fn root_services(services: &ServiceMap) -> Vec<String> {
    services
        .values()
        .filter(|s| s.env(ACTIVATE_KEY).is_some_and(is_truthy))
        .map(|s| s.name.clone())
        .collect()
}

struct ServiceGraph<'a> {
    names: Vec<&'a str>,
    edges: Vec<Vec<usize>>,
    index: HashMap<&'a str, usize>,
}

impl<'a> ServiceGraph<'a> {
    fn build(services: &'a ServiceMap) -> Result<Self> {
        let names: Vec<&str> = services.keys().map(String::as_str).collect();
        let index: HashMap<&str, usize> =
            names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        let mut edges = Vec::with_capacity(names.len());
        for service in services.values() {
            let mut out = Vec::with_capacity(service.depends_on.len());
            for dep in &service.depends_on {
                let target = index.get(dep.as_str()).ok_or_else(|| Error::Configuration {
                    message: format!(
                        "Service {} depends on unknown service {}",
                        service.name, dep
                    ),
                    hint: None,
                })?;
                out.push(*target);
            }
            edges.push(out);
        }

        Ok(Self {
            names,
            edges,
            index,
        })
    }

    fn closure(&self, roots: &[String]) -> Result<Vec<String>> {
        let mut visited = vec![false; self.names.len()];
        let mut worklist = VecDeque::new();
        let mut order = Vec::new();

        for root in roots {
            let idx = *self
                .index
                .get(root.as_str())
                .ok_or_else(|| Error::configuration(format!("Unknown service {}", root)))?;
            if !visited[idx] {
                visited[idx] = true;
                worklist.push_back(idx);
            }
        }

        while let Some(idx) = worklist.pop_front() {
            order.push(self.names[idx].to_string());
            for &dep in &self.edges[idx] {
                if !visited[dep] {
                    visited[dep] = true;
                    worklist.push_back(dep);
                }
            }
        }

        Ok(order)
    }
}

/// Closes `roots` over `depends_on`, returning roots first.
pub fn close_over_dependencies(services: &ServiceMap, roots: &[String]) -> Result<ActiveServiceSet> {
    let graph = ServiceGraph::build(services)?;
    Ok(ActiveServiceSet {
        names: graph.closure(roots)?,
    })
}

/// Computes the active service set of a merged configuration.
pub fn find_active(services: &ServiceMap) -> Result<ActiveServiceSet> {
    let roots = root_services(services);
    if roots.is_empty() {
        return Err(Error::Configuration {
            message: "You have no active service".to_string(),
            hint: Some(suggestions::activate_a_service()),
        });
    }
    close_over_dependencies(services, &roots)
}

/// Fails when an active service still carries a placeholder value.
///
/// Every offending key is listed, together with the active services that
/// require it.
pub fn check_placeholders(services: &ServiceMap, active: &ActiveServiceSet) -> Result<()> {
    let mut missing: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for name in active.iter() {
        let Some(service) = services.get(name) else {
            continue;
        };
        for (key, value) in &service.environment {
            if is_placeholder(value) {
                missing.entry(key.as_str()).or_default().push(name);
            }
        }
    }

    if missing.is_empty() {
        return Ok(());
    }

    let keys = missing
        .into_iter()
        .map(|(key, mut users)| {
            users.sort_unstable();
            format!("{:<20}\trequired by\t{}", key, users.join(", "))
        })
        .collect();
    Err(Error::Placeholder { keys })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceDefinition;
    use crate::layers::testing::services;

    fn names(set: &ActiveServiceSet) -> Vec<&str> {
        set.iter().collect()
    }

    #[test]
    fn test_truthiness() {
        for v in ["1", "true", "TRUE", "yes", "On", " 1 "] {
            assert!(is_truthy(v), "{} should be truthy", v);
        }
        for v in ["0", "false", "", "no", "off", "2", "enabled"] {
            assert!(!is_truthy(v), "{} should be falsy", v);
        }
    }

    #[test]
    fn test_activation_with_dependency_excludes_unrelated() {
        let map = services(vec![
            ServiceDefinition::new("A")
                .with_env("ACTIVATE", "1")
                .depends_on("B"),
            ServiceDefinition::new("B"),
            ServiceDefinition::new("C"),
        ]);

        let active = find_active(&map).unwrap();
        assert_eq!(names(&active), vec!["A", "B"]);
        assert!(!active.contains("C"));
    }

    #[test]
    fn test_transitive_dependencies() {
        let map = services(vec![
            ServiceDefinition::new("proxy")
                .with_env("ACTIVATE", "true")
                .depends_on("backend"),
            ServiceDefinition::new("backend").depends_on("postgres"),
            ServiceDefinition::new("postgres"),
            ServiceDefinition::new("unused").depends_on("postgres"),
        ]);

        let active = find_active(&map).unwrap();
        assert_eq!(names(&active), vec!["proxy", "backend", "postgres"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let map = services(vec![
            ServiceDefinition::new("A")
                .with_env("ACTIVATE", "1")
                .depends_on("B"),
            ServiceDefinition::new("B").depends_on("A"),
        ]);

        let active = find_active(&map).unwrap();
        assert_eq!(names(&active), vec!["A", "B"]);
    }

    #[test]
    fn test_self_dependency_terminates() {
        let map = services(vec![ServiceDefinition::new("A")
            .with_env("ACTIVATE", "1")
            .depends_on("A")]);
        assert_eq!(names(&find_active(&map).unwrap()), vec!["A"]);
    }

    #[test]
    fn test_closure_is_idempotent() {
        let map = services(vec![
            ServiceDefinition::new("A")
                .with_env("ACTIVATE", "1")
                .depends_on("B"),
            ServiceDefinition::new("B").depends_on("C"),
            ServiceDefinition::new("C").depends_on("A"),
            ServiceDefinition::new("D"),
        ]);

        let first = find_active(&map).unwrap();
        let second = close_over_dependencies(&map, first.as_slice()).unwrap();
        let mut a: Vec<&str> = names(&first);
        let mut b: Vec<&str> = names(&second);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_active_service_is_an_error() {
        let map = services(vec![
            ServiceDefinition::new("A").with_env("ACTIVATE", "0"),
            ServiceDefinition::new("B"),
        ]);

        let err = find_active(&map).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("no active service"));
    }

    #[test]
    fn test_unknown_dependency_is_an_error() {
        let map = services(vec![ServiceDefinition::new("A")
            .with_env("ACTIVATE", "1")
            .depends_on("ghost")]);
        assert!(matches!(
            find_active(&map),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_placeholders_are_all_reported() {
        let map = services(vec![
            ServiceDefinition::new("backend")
                .with_env("ACTIVATE", "1")
                .with_env("SMTP_PASSWORD", "**PLACEHOLDER**")
                .depends_on("postgres"),
            ServiceDefinition::new("postgres")
                .with_env("POSTGRES_PASSWORD", "**PLACEHOLDER**"),
            ServiceDefinition::new("inactive").with_env("SECRET", "**PLACEHOLDER**"),
        ]);

        let active = find_active(&map).unwrap();
        let err = check_placeholders(&map, &active).unwrap_err();
        match &err {
            Error::Placeholder { keys } => {
                assert_eq!(keys.len(), 2);
                assert!(keys[0].starts_with("POSTGRES_PASSWORD"));
                assert!(keys[0].ends_with("postgres"));
                assert!(keys[1].starts_with("SMTP_PASSWORD"));
            }
            other => panic!("Expected placeholder error, got {:?}", other),
        }
        assert!(!err.to_string().contains("SECRET"));
    }

    #[test]
    fn test_placeholder_inside_longer_value() {
        assert!(is_placeholder("user:**PLACEHOLDER**"));
        assert!(!is_placeholder("PLACEHOLDER"));
    }

    #[test]
    fn test_clean_configuration_passes_gate() {
        let map = services(vec![ServiceDefinition::new("A")
            .with_env("ACTIVATE", "1")
            .with_env("PASSWORD", "s3cret")]);
        let active = find_active(&map).unwrap();
        assert!(check_placeholders(&map, &active).is_ok());
    }
}
