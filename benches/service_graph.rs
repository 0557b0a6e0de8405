//! Benchmarks for layer parsing and service activation.
//!
//! These benchmarks measure how decoding compose layers, merging them and
//! closing the active set over `depends_on` scale with the number of
//! services.

use blueprint::activation;
use blueprint::config::{self, ServiceMap};
use blueprint::layers::merge_layer;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// A layer of `services` services forming a chain, with every tenth one
/// activated.
fn generate_layer(services: usize, tag: &str) -> String {
    let mut layer = String::from("services:\n");
    for i in 0..services {
        layer.push_str(&format!("  service{}:\n    image: demo/service{}:{}\n", i, i, tag));
        if i + 1 < services {
            layer.push_str(&format!("    depends_on:\n      - service{}\n", i + 1));
        }
        layer.push_str("    environment:\n");
        layer.push_str(&format!("      SERVICE_INDEX: {}\n", i));
        if i % 10 == 0 {
            layer.push_str("      ACTIVATE: 1\n");
        }
    }
    layer
}

fn bench_layer_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer_parsing");

    for services in [10, 50, 200] {
        let layer = generate_layer(services, "1.0");
        group.bench_with_input(
            BenchmarkId::new("services", services),
            &layer,
            |b, layer| b.iter(|| config::parse_services(black_box(layer))),
        );
    }

    group.finish();
}

fn bench_layer_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("layer_merge");

    for services in [10, 50, 200] {
        let layers: Vec<ServiceMap> = ["1.0", "2.0", "3.0"]
            .iter()
            .map(|tag| config::parse_services(&generate_layer(services, tag)).unwrap())
            .collect();
        group.bench_with_input(
            BenchmarkId::new("services", services),
            &layers,
            |b, layers| {
                b.iter(|| {
                    let mut merged = ServiceMap::new();
                    for layer in layers {
                        merge_layer(&mut merged, black_box(layer.clone()));
                    }
                    merged
                })
            },
        );
    }

    group.finish();
}

fn bench_activation(c: &mut Criterion) {
    let mut group = c.benchmark_group("activation");

    for services in [10, 50, 200, 1000] {
        let map = config::parse_services(&generate_layer(services, "1.0")).unwrap();
        group.bench_with_input(BenchmarkId::new("chain", services), &map, |b, map| {
            b.iter(|| activation::find_active(black_box(map)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_layer_parsing, bench_layer_merge, bench_activation);
criterion_main!(benches);
