//! Post clustering.
//!
//! - [`DbscanClustering`] groups post embeddings into dense clusters
//! - [`materialize`] turns a run's output into storable [`ClusterInfo`]s
//! - [`ClusterStore`] maintains clusters and user-cluster ranks between runs

mod dbscan;
mod store;

pub use dbscan::{
    ClusteringResult, DbscanClustering, NoiseHandling, PointLabel, RawCluster, OUTLIER_CLUSTER_ID,
};
pub use store::{ClusterEngagementStats, ClusterStore};

use crate::types::{ClusterInfo, ContentItem, EmbeddingVector, Metadata};
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Builds [`ClusterInfo`]s from a clustering run.
///
/// `posts` supplies tags and authors for members; members missing from it
/// still join the cluster but contribute no topics or creators. Topics are
/// the `max_topics` most frequent lowercased member tags, ties broken
/// alphabetically.
pub fn materialize(
    result: &ClusteringResult,
    posts: &HashMap<String, ContentItem>,
    max_topics: usize,
) -> Vec<ClusterInfo> {
    let now = Utc::now();
    result
        .clusters
        .iter()
        .map(|raw| {
            let topics = top_tags(&raw.member_ids, posts, max_topics);
            let creators: BTreeSet<&str> = raw
                .member_ids
                .iter()
                .filter_map(|id| posts.get(id))
                .map(|p| p.author_id.as_str())
                .collect();

            let mut metadata = Metadata::new();
            metadata.insert("cohesion".into(), Value::from(raw.cohesion as f64));
            metadata.insert(
                "creators".into(),
                Value::from(creators.into_iter().collect::<Vec<_>>()),
            );
            for key in ["language", "location"] {
                if let Some(value) = dominant_metadata(&raw.member_ids, posts, key) {
                    metadata.insert(key.into(), Value::from(value));
                }
            }
            if raw.is_outlier {
                metadata.insert("outliers".into(), Value::Bool(true));
            }

            let name = if topics.is_empty() {
                raw.id.clone()
            } else {
                topics.iter().take(2).cloned().collect::<Vec<_>>().join(" & ")
            };

            ClusterInfo {
                id: raw.id.clone(),
                name,
                centroid: EmbeddingVector::new(raw.centroid.clone()),
                topics,
                member_ids: raw.member_ids.clone(),
                size: raw.size(),
                density: raw.density,
                metadata,
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}

fn top_tags(
    member_ids: &[String],
    posts: &HashMap<String, ContentItem>,
    max_topics: usize,
) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for post in member_ids.iter().filter_map(|id| posts.get(id)) {
        let tags: BTreeSet<String> = post
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        for tag in tags {
            *counts.entry(tag).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(max_topics).map(|(t, _)| t).collect()
}

/// Most common string value of `key` in member metadata.
fn dominant_metadata(
    member_ids: &[String],
    posts: &HashMap<String, ContentItem>,
    key: &str,
) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in member_ids.iter().filter_map(|id| posts.get(id)) {
        if let Some(value) = post.metadata.get(key).and_then(Value::as_str) {
            *counts.entry(value).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string())
}

/// True for the pseudo-cluster that collects DBSCAN noise.
pub fn is_outlier_cluster(cluster: &ClusterInfo) -> bool {
    cluster
        .metadata
        .get("outliers")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
