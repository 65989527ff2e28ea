//! Benchmarks for cluster and candidate ranking.
//!
//! Run with: `cargo bench -p swipe-core --bench ranking`
//!
//! Measures:
//! - Six-component cluster ranking for users with growing histories
//! - Five-factor candidate ranking with and without diversification
//! - A full recommendation request against the in-memory store

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use swipe_core::config::{EngineConfig, RankingConfig, EMBEDDING_DIM};
use swipe_core::embedding::HashingEmbeddingModel;
use swipe_core::ranking::{Candidate, CandidateRanker, ClusterRanker, UserRankingInput};
use swipe_core::recommendation::{RecommendationCoordinator, Repositories};
use swipe_core::storage::InMemoryStore;
use swipe_core::types::{
    ClusterInfo, ContentItem, EmbeddingVector, EngagementStats, EntityKind, InteractionType,
    Metadata, RecommendationContext, RecommendationOptions, UserInteraction, UserProfile,
};
use swipe_core::vector::normalize_l2;

// =============================================================================
// Test Data Generation
// =============================================================================

/// Seed of the user embedding; distinct from cluster and post seeds.
const USER_EMBEDDING_SEED: u64 = 1_000_000;

fn seeded_embedding(seed: u64) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let raw: Vec<f32> = (0..EMBEDDING_DIM)
        .map(|i| {
            let mut hasher = DefaultHasher::new();
            seed.hash(&mut hasher);
            i.hash(&mut hasher);
            ((hasher.finish() as f32 / u64::MAX as f32) * 2.0) - 1.0
        })
        .collect();
    normalize_l2(&raw)
}

fn post(id: u64) -> ContentItem {
    ContentItem {
        id: format!("post-{}", id),
        author_id: format!("author-{}", id % 17),
        text: format!("post number {} about topic {}", id, id % 5),
        tags: vec![format!("topic-{}", id % 5)],
        engagement: EngagementStats {
            views: 100 + id,
            likes: id % 40,
            comments: id % 7,
            shares: id % 3,
            saves: id % 2,
        },
        created_at: Utc::now() - Duration::hours((id % 150) as i64),
        metadata: Metadata::new(),
    }
}

fn cluster(id: u64, members: usize) -> ClusterInfo {
    let now = Utc::now();
    let member_ids: Vec<String> = (0..members as u64)
        .map(|m| format!("post-{}", id * 1000 + m))
        .collect();
    ClusterInfo {
        id: format!("dbscan-{}", id),
        name: format!("cluster {}", id),
        centroid: EmbeddingVector::new(seeded_embedding(id)),
        topics: vec![format!("topic-{}", id % 5)],
        size: member_ids.len(),
        member_ids,
        density: 12.0,
        metadata: Metadata::new(),
        created_at: now,
        updated_at: now - Duration::hours(id as i64),
    }
}

fn history(len: usize) -> Vec<UserInteraction> {
    (0..len)
        .map(|i| UserInteraction {
            id: format!("i{}", i),
            user_id: "bench-user".to_string(),
            entity_id: format!("post-{}", (i % 20) * 1000 + i % 7),
            entity_type: EntityKind::Post,
            interaction_type: InteractionType::ALL[i % InteractionType::ALL.len()],
            timestamp: Utc::now() - Duration::minutes(i as i64 * 30),
            metadata: Metadata::new(),
        })
        .collect()
}

// =============================================================================
// Benchmarks
// =============================================================================

/// Benchmark: cluster ranking with varying history lengths
fn bench_rank_clusters(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking/clusters_by_history");
    let ranker = ClusterRanker::new(RankingConfig::default());
    let clusters: Vec<ClusterInfo> = (0..20).map(|i| cluster(i, 40)).collect();

    for len in [0, 50, 100, 500] {
        let mut input = UserRankingInput::new(UserProfile::new("bench-user"));
        input.embedding = Some(seeded_embedding(USER_EMBEDDING_SEED));
        input.interactions = history(len);
        input.interaction_count = len;
        input.recent_clusters = clusters.iter().take(5).cloned().collect();
        input.context = Some(RecommendationContext::at(Utc::now()));

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| ranker.rank_clusters(black_box(&clusters), black_box(&input)));
        });
    }
    group.finish();
}

/// Benchmark: candidate ranking with varying candidate counts
fn bench_rank_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking/candidates_by_count");
    let ranker = CandidateRanker::default();
    let user = seeded_embedding(USER_EMBEDDING_SEED);

    for count in [25, 100, 400] {
        let candidates: Vec<Candidate> = (0..count as u64)
            .map(|i| Candidate {
                item: post(i),
                cluster_id: format!("dbscan-{}", i % 3),
                cluster_score: 0.5,
                embedding: Some(seeded_embedding(i)),
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        for (label, diversity) in [("plain", 0.4f32), ("diversified", 0.8)] {
            let options = RecommendationOptions {
                limit: 20,
                diversity,
                ..Default::default()
            };
            group.bench_with_input(BenchmarkId::new(label, count), &count, |b, _| {
                b.iter(|| {
                    ranker
                        .rank(black_box(&candidates), Some(&user), &options, Utc::now())
                        .unwrap()
                });
            });
        }
    }
    group.finish();
}

/// Benchmark: cold-start request against the in-memory store
fn bench_cold_start_request(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    for i in 0..500 {
        store.insert_content(post(i)).unwrap();
    }
    let engine = RecommendationCoordinator::new(
        Repositories::shared(store),
        Arc::new(HashingEmbeddingModel::default()),
        EngineConfig::default(),
    )
    .unwrap();
    let options = engine.default_options();

    c.bench_function("recommendation/cold_start", |b| {
        b.to_async(&runtime).iter(|| async {
            engine
                .get_recommendations(black_box("new-user"), &options)
                .await
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_rank_clusters,
    bench_rank_candidates,
    bench_cold_start_request
);
criterion_main!(benches);
