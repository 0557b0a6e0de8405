//! Property-based tests for layer merging and service activation.
//!
//! These tests use proptest to generate random layer stacks and dependency
//! graphs and verify that invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::activation::close_over_dependencies;
    use crate::config::{ServiceDefinition, ServiceMap};
    use crate::layers::merge_layer;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    const NAMES: usize = 8;

    fn name(i: usize) -> String {
        format!("s{}", i)
    }

    /// A layer: some services, each with an image tagged by `tag`.
    fn layer(tag: usize) -> impl Strategy<Value = ServiceMap> {
        prop::collection::btree_set(0..NAMES, 0..NAMES).prop_map(move |ids| {
            ids.into_iter()
                .map(|i| {
                    let service = ServiceDefinition::new(name(i)).with_image(format!("img{}", tag));
                    (service.name.clone(), service)
                })
                .collect()
        })
    }

    fn stack() -> impl Strategy<Value = Vec<ServiceMap>> {
        (1..5usize).prop_flat_map(|n| (0..n).map(layer).collect::<Vec<_>>())
    }

    /// A closed graph over `NAMES` services.
    fn graph() -> impl Strategy<Value = ServiceMap> {
        prop::collection::vec(prop::collection::btree_set(0..NAMES, 0..3), NAMES).prop_map(
            |edges| {
                edges
                    .into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let service = deps
                            .into_iter()
                            .fold(ServiceDefinition::new(name(i)), |s, d| s.depends_on(name(d)));
                        (service.name.clone(), service)
                    })
                    .collect()
            },
        )
    }

    fn roots() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(0..NAMES, 1..4)
            .prop_map(|ids| ids.into_iter().map(name).collect())
    }

    proptest! {
        /// Property: every merged service comes from the last layer defining it
        #[test]
        fn merge_keeps_last_definition(layers in stack()) {
            let mut merged = ServiceMap::new();
            for layer in layers.clone() {
                merge_layer(&mut merged, layer);
            }

            for (service, definition) in &merged {
                let last = layers
                    .iter()
                    .rposition(|l| l.contains_key(service))
                    .unwrap();
                prop_assert_eq!(definition.image.clone(), Some(format!("img{}", last)));
            }

            let defined: BTreeSet<&String> = layers.iter().flat_map(|l| l.keys()).collect();
            prop_assert_eq!(defined.len(), merged.len());
        }

        /// Property: reversing the layer order changes the winner of shared services
        #[test]
        fn merge_is_order_dependent(first in layer(0), second in layer(1)) {
            let mut forward = ServiceMap::new();
            merge_layer(&mut forward, first.clone());
            merge_layer(&mut forward, second.clone());

            let mut backward = ServiceMap::new();
            merge_layer(&mut backward, second.clone());
            merge_layer(&mut backward, first.clone());

            for service in first.keys().filter(|k| second.contains_key(*k)) {
                prop_assert_eq!(forward[service].image.as_deref(), Some("img1"));
                prop_assert_eq!(backward[service].image.as_deref(), Some("img0"));
            }
        }

        /// Property: the closure contains its roots and is closed under depends_on
        #[test]
        fn closure_is_closed(services in graph(), roots in roots()) {
            let active = close_over_dependencies(&services, &roots).unwrap();
            for root in &roots {
                prop_assert!(active.contains(root));
            }
            for service in active.iter() {
                for dep in &services[service].depends_on {
                    prop_assert!(active.contains(dep));
                }
            }
            let unique: BTreeSet<&str> = active.iter().collect();
            prop_assert_eq!(unique.len(), active.len());
        }

        /// Property: closing an already closed set changes nothing
        #[test]
        fn closure_is_idempotent(services in graph(), roots in roots()) {
            let once = close_over_dependencies(&services, &roots).unwrap();
            let twice = close_over_dependencies(&services, once.as_slice()).unwrap();
            let once: BTreeSet<&str> = once.iter().collect();
            let twice: BTreeSet<&str> = twice.iter().collect();
            prop_assert_eq!(once, twice);
        }
    }
}
