//! Cluster matching: which clusters are worth pulling candidates from.

use crate::clustering::is_outlier_cluster;
use crate::config::MatcherConfig;
use crate::types::{ClusterInfo, RecommendationContext, UserClusterRank, UserProfile};
use crate::vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMatch {
    pub cluster: ClusterInfo,
    pub score: f32,
    /// max(embedding cosine, stored rank score), clamped to [0, 1].
    pub similarity: f32,
    pub context_boost: f32,
}

/// Selects the clusters that best fit a user.
///
/// A cluster's similarity is the larger of the embedding cosine and the
/// user's stored rank score for it, so behavioral history can surface a
/// cluster even when the embedding disagrees. The match score is
/// `(1 - context_weight) * similarity + context_weight * boost` where the
/// contextual boost rewards shared interests, active hours, location and
/// language.
#[derive(Debug, Clone, Default)]
pub struct ClusterMatcher {
    config: MatcherConfig,
}

impl ClusterMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Clusters scoring at least the match threshold, best first, at most
    /// `max_clusters`. The outlier pseudo-cluster is never matched.
    pub fn find_matching_clusters(
        &self,
        user_embedding: Option<&[f32]>,
        profile: &UserProfile,
        ranks: &[UserClusterRank],
        clusters: &[ClusterInfo],
        context: Option<&RecommendationContext>,
    ) -> Vec<ClusterMatch> {
        let rank_scores: HashMap<&str, f32> = ranks
            .iter()
            .filter(|r| r.is_active)
            .map(|r| (r.cluster_id.as_str(), r.score))
            .collect();

        let mut matches: Vec<ClusterMatch> = clusters
            .iter()
            .filter(|c| !is_outlier_cluster(c))
            .filter_map(|cluster| {
                let cosine = user_embedding
                    .and_then(|e| vector::cosine_similarity(e, cluster.centroid.as_slice()).ok())
                    .unwrap_or(0.0);
                let ranked = rank_scores.get(cluster.id.as_str()).copied().unwrap_or(0.0);
                let similarity = cosine.max(ranked).clamp(0.0, 1.0);
                let boost = self.context_boost(cluster, profile, context);
                let w = self.config.context_weight.clamp(0.0, 1.0);
                let score = (1.0 - w) * similarity + w * boost;

                (score >= self.config.min_match_threshold).then(|| ClusterMatch {
                    cluster: cluster.clone(),
                    score,
                    similarity,
                    context_boost: boost,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.cluster.id.cmp(&b.cluster.id))
        });
        matches.truncate(self.config.max_clusters);
        debug!(matched = matches.len(), "Matched clusters");
        matches
    }

    /// Contextual boost in [0, 1].
    pub fn context_boost(
        &self,
        cluster: &ClusterInfo,
        profile: &UserProfile,
        context: Option<&RecommendationContext>,
    ) -> f32 {
        let mut boost = 0.0;

        let interests: HashSet<String> = profile.interests.iter().map(|i| i.to_lowercase()).collect();
        let shared = cluster
            .topics
            .iter()
            .filter(|t| interests.contains(&t.to_lowercase()))
            .count();
        boost += (shared as f32 * self.config.interest_boost).min(self.config.interest_boost_cap);

        if let Some(hour) = context.and_then(|c| c.time_of_day) {
            if profile.active_hours.contains(&hour) {
                boost += self.config.active_time_boost;
            }
        }

        let demographics = profile.demographics.as_ref();
        let location = context
            .and_then(|c| c.location.as_deref())
            .or_else(|| demographics.and_then(|d| d.location.as_deref()));
        if metadata_matches(cluster, "location", location) {
            boost += self.config.location_boost;
        }
        let language = context
            .and_then(|c| c.language.as_deref())
            .or_else(|| demographics.and_then(|d| d.language.as_deref()));
        if metadata_matches(cluster, "language", language) {
            boost += self.config.language_boost;
        }

        boost.min(1.0)
    }
}

fn metadata_matches(cluster: &ClusterInfo, key: &str, wanted: Option<&str>) -> bool {
    match (wanted, cluster.metadata.get(key).and_then(Value::as_str)) {
        (Some(wanted), Some(have)) => wanted.eq_ignore_ascii_case(have),
        _ => false,
    }
}
