//! Benchmarks for DBSCAN clustering.
//!
//! Run with: `cargo bench -p swipe-core --bench clustering`
//!
//! A run builds the full pairwise distance matrix, so time and memory grow
//! quadratically with the number of points. These benchmarks track that
//! curve at production dimension and parameters.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use swipe_core::clustering::DbscanClustering;
use swipe_core::config::{ClusteringConfig, EMBEDDING_DIM};

// =============================================================================
// Test Data Generation
// =============================================================================

/// Number of dense groups the generated points are spread over.
const GROUPS: u64 = 8;

/// Deterministic vector in [-1, 1]^EMBEDDING_DIM for a seed.
fn seeded_vector(seed: u64) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    (0..EMBEDDING_DIM)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            seed.hash(&mut hasher);
            i.hash(&mut hasher);
            ((hasher.finish() as f32 / u64::MAX as f32) * 2.0) - 1.0
        })
        .collect()
}

/// `size` points around `GROUPS` group centers plus small per-point jitter.
fn grouped_points(size: usize) -> (Vec<String>, Vec<Vec<f32>>) {
    let centers: Vec<Vec<f32>> = (0..GROUPS).map(seeded_vector).collect();
    let mut ids = Vec::with_capacity(size);
    let mut points = Vec::with_capacity(size);
    for i in 0..size as u64 {
        let center = &centers[(i % GROUPS) as usize];
        let jitter = seeded_vector(1_000_000 + i);
        points.push(
            center
                .iter()
                .zip(&jitter)
                .map(|(c, j)| c + 0.05 * j)
                .collect(),
        );
        ids.push(format!("post-{}", i));
    }
    (ids, points)
}

// =============================================================================
// Benchmarks
// =============================================================================

/// Benchmark: DBSCAN with varying catalog sizes
fn bench_dbscan_varying_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("dbscan/cluster_by_size");
    group.sample_size(10);

    let engine = DbscanClustering::new(ClusteringConfig::default());
    for size in [100, 250, 500, 1000] {
        let (ids, points) = grouped_points(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| engine.cluster(black_box(&ids), black_box(&points)).unwrap());
        });
    }
    group.finish();
}

/// Benchmark: DBSCAN with varying epsilon at a fixed size
///
/// Larger neighborhoods mean longer expansion queues.
fn bench_dbscan_varying_epsilon(c: &mut Criterion) {
    let mut group = c.benchmark_group("dbscan/cluster_by_epsilon");
    group.sample_size(10);

    let (ids, points) = grouped_points(500);
    for epsilon in [0.1f32, 0.3, 0.6] {
        let engine = DbscanClustering::new(ClusteringConfig {
            epsilon,
            ..Default::default()
        });
        group.bench_with_input(BenchmarkId::from_parameter(epsilon), &epsilon, |b, _| {
            b.iter(|| engine.cluster(black_box(&ids), black_box(&points)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dbscan_varying_size, bench_dbscan_varying_epsilon);
criterion_main!(benches);
