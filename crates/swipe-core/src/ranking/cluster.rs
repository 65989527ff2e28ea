//! Six-component cluster ranking.

use super::temporal;
use super::weights::{adjust_cluster_weights, UserActivity};
use crate::config::{ComponentWeights, RankingConfig};
use crate::interaction::decay_weight;
use crate::types::{ClusterInfo, RecommendationContext, UserInteraction, UserProfile};
use crate::vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Score used when a component lacks the data to say anything.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Engagement score for users with history but none in this cluster.
const UNENGAGED_CLUSTER_SCORE: f32 = 0.4;

/// Per-component scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub affinity: f32,
    pub engagement: f32,
    pub novelty: f32,
    pub diversity: f32,
    pub temporal: f32,
    pub quality: f32,
}

impl ComponentScores {
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.affinity,
            self.engagement,
            self.novelty,
            self.diversity,
            self.temporal,
            self.quality,
        ]
    }

    pub fn weighted_sum(&self, weights: &ComponentWeights) -> f32 {
        self.as_array()
            .iter()
            .zip(weights.as_array())
            .map(|(s, w)| s * w)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRankingResult {
    pub cluster_id: String,
    pub score: f32,
    /// 1 when the weighted components agree, falling toward 0 as they spread.
    pub confidence: f32,
    pub components: ComponentScores,
    pub weights: ComponentWeights,
}

/// Everything known about the requesting user.
#[derive(Debug, Clone)]
pub struct UserRankingInput {
    pub embedding: Option<Vec<f32>>,
    pub profile: UserProfile,
    /// Most recent first.
    pub interactions: Vec<UserInteraction>,
    /// Lifetime interaction count, which may exceed `interactions.len()`.
    pub interaction_count: usize,
    /// Clusters the user consumed recently, newest first.
    pub recent_clusters: Vec<ClusterInfo>,
    pub context: Option<RecommendationContext>,
    pub now: DateTime<Utc>,
}

impl UserRankingInput {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            embedding: None,
            profile,
            interactions: Vec::new(),
            interaction_count: 0,
            recent_clusters: Vec::new(),
            context: None,
            now: Utc::now(),
        }
    }

    fn activity(&self) -> UserActivity {
        UserActivity {
            interaction_count: self.interaction_count.max(self.interactions.len()),
            has_embedding: self.usable_embedding().is_some(),
        }
    }

    fn usable_embedding(&self) -> Option<&[f32]> {
        self.embedding
            .as_deref()
            .filter(|e| !vector::is_zero(e))
    }
}

/// Ranks clusters for a user by affinity, engagement, novelty, diversity,
/// temporal relevance and quality.
///
/// Every component scorer returns a value in [0, 1] and falls back to
/// [`NEUTRAL_SCORE`] when it lacks data, so ranking itself never fails.
#[derive(Debug, Clone, Default)]
pub struct ClusterRanker {
    config: RankingConfig,
}

impl ClusterRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Scores every cluster and returns them best first.
    #[instrument(skip_all, fields(clusters = clusters.len()))]
    pub fn rank_clusters(
        &self,
        clusters: &[ClusterInfo],
        user: &UserRankingInput,
    ) -> Vec<ClusterRankingResult> {
        let weights = adjust_cluster_weights(&self.config, user.activity(), user.context.as_ref());

        let mut results: Vec<ClusterRankingResult> = clusters
            .iter()
            .map(|cluster| {
                let components = self.score_components(cluster, user);
                ClusterRankingResult {
                    cluster_id: cluster.id.clone(),
                    score: components.weighted_sum(&weights).clamp(0.0, 1.0),
                    confidence: confidence(&components, &weights),
                    components,
                    weights,
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(
            top = results.first().map(|r| r.cluster_id.as_str()).unwrap_or(""),
            "Ranked clusters"
        );
        results
    }

    pub fn score_components(&self, cluster: &ClusterInfo, user: &UserRankingInput) -> ComponentScores {
        ComponentScores {
            affinity: self.affinity(cluster, user),
            engagement: self.engagement(cluster, user),
            novelty: self.novelty(cluster, user),
            diversity: self.diversity(cluster, user),
            temporal: self.temporal(cluster, user),
            quality: self.quality(cluster),
        }
    }

    fn affinity(&self, cluster: &ClusterInfo, user: &UserRankingInput) -> f32 {
        if let Some(embedding) = user.usable_embedding() {
            let similarity = match vector::cosine_similarity(embedding, cluster.centroid.as_slice()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(cluster_id = %cluster.id, error = %e, "Affinity degraded to neutral");
                    return NEUTRAL_SCORE;
                }
            };
            let mut score = similarity * self.config.embedding_similarity_weight;
            if similarity < self.config.similarity_floor {
                score *= 0.5;
            }
            return score.clamp(0.0, 1.0);
        }

        let interests = lowercase_set(&user.profile.interests);
        let topics = lowercase_set(&cluster.topics);
        let smaller = interests.len().min(topics.len());
        if smaller == 0 {
            return NEUTRAL_SCORE;
        }
        interests.intersection(&topics).count() as f32 / smaller as f32
    }

    fn engagement(&self, cluster: &ClusterInfo, user: &UserRankingInput) -> f32 {
        if user.interactions.is_empty() {
            return NEUTRAL_SCORE;
        }
        let relevant: Vec<&UserInteraction> = user
            .interactions
            .iter()
            .filter(|e| cluster.contains(&e.entity_id))
            .take(self.config.max_interactions)
            .collect();
        if relevant.is_empty() {
            return UNENGAGED_CLUSTER_SCORE;
        }
        let total: f32 = relevant
            .iter()
            .map(|e| decay_weight(e.interaction_type, e.age_hours(user.now)))
            .sum();
        (1.0 - (-total * self.config.engagement_normalization).exp()).clamp(0.0, 1.0)
    }

    /// 1.0 for clusters the user never engaged with. Otherwise blends the
    /// share of members not seen recently (each seen member recovering with
    /// `exp(-days / (window / 4))`) with the share of topics outside the
    /// user's interests.
    fn novelty(&self, cluster: &ClusterInfo, user: &UserRankingInput) -> f32 {
        let mut last_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
        for event in user.interactions.iter().filter(|e| cluster.contains(&e.entity_id)) {
            let seen = last_seen.entry(event.entity_id.as_str()).or_insert(event.timestamp);
            if event.timestamp > *seen {
                *seen = event.timestamp;
            }
        }
        if last_seen.is_empty() || cluster.member_ids.is_empty() {
            return 1.0;
        }

        let time_constant = (self.config.novelty_window_days / 4.0).max(f32::EPSILON);
        let familiarity: f32 = last_seen
            .values()
            .map(|t| {
                let days = (user.now - *t).num_seconds().max(0) as f32 / 86_400.0;
                (-days / time_constant).exp()
            })
            .sum();
        let content = (1.0 - familiarity / cluster.member_ids.len() as f32).clamp(0.0, 1.0);

        let topics = lowercase_set(&cluster.topics);
        let topic = if topics.is_empty() {
            NEUTRAL_SCORE
        } else {
            let interests = lowercase_set(&user.profile.interests);
            topics.difference(&interests).count() as f32 / topics.len() as f32
        };

        (content * self.config.novelty_content_weight + topic * self.config.novelty_topic_weight)
            .clamp(0.0, 1.0)
    }

    fn diversity(&self, cluster: &ClusterInfo, user: &UserRankingInput) -> f32 {
        let recent: Vec<&ClusterInfo> = user
            .recent_clusters
            .iter()
            .take(self.config.recent_cluster_window)
            .collect();
        if recent.is_empty() {
            return NEUTRAL_SCORE;
        }

        let topics = lowercase_set(&cluster.topics);
        let topic_distance = recent
            .iter()
            .map(|r| 1.0 - jaccard(&topics, &lowercase_set(&r.topics)))
            .sum::<f32>()
            / recent.len() as f32;

        let creators = cluster.creators();
        let creator_distinctness = if creators.is_empty() {
            NEUTRAL_SCORE
        } else {
            let seen: HashSet<String> = recent.iter().flat_map(|r| r.creators()).collect();
            creators.iter().filter(|c| !seen.contains(*c)).count() as f32 / creators.len() as f32
        };

        let membership_distinctness = if cluster.member_ids.is_empty() {
            NEUTRAL_SCORE
        } else {
            let seen: HashSet<&str> = recent
                .iter()
                .flat_map(|r| r.member_ids.iter().map(String::as_str))
                .collect();
            cluster
                .member_ids
                .iter()
                .filter(|m| !seen.contains(m.as_str()))
                .count() as f32
                / cluster.member_ids.len() as f32
        };

        (topic_distance * self.config.diversity_topic_weight
            + creator_distinctness * self.config.diversity_creator_weight
            + membership_distinctness * self.config.diversity_format_weight)
            .clamp(0.0, 1.0)
    }

    fn temporal(&self, cluster: &ClusterInfo, user: &UserRankingInput) -> f32 {
        let Some(context) = user.context.as_ref() else {
            return NEUTRAL_SCORE;
        };
        let hour = context
            .time_of_day
            .map(temporal::hour_relevance)
            .unwrap_or(NEUTRAL_SCORE);
        let day = if context.day_of_week.is_some() {
            temporal::day_relevance(context)
        } else {
            NEUTRAL_SCORE
        };
        let age_hours = (user.now - cluster.updated_at).num_seconds().max(0) as f32 / 3600.0;
        let freshness = (-age_hours / self.config.freshness_decay_hours.max(f32::EPSILON)).exp();

        (hour * 0.4 + day * 0.2 + freshness * 0.4).clamp(0.0, 1.0)
    }

    fn quality(&self, cluster: &ClusterInfo) -> f32 {
        let density = (1.0 - (-cluster.density.max(0.0)).exp()).clamp(0.0, 1.0);
        let cohesion = cluster
            .metadata_f32("cohesion")
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(density);
        let stability = cluster
            .metadata_f32("stability")
            .map(|s| s.clamp(0.0, 1.0))
            .unwrap_or(NEUTRAL_SCORE);

        let size = cluster.size;
        let (min, max) = (self.config.optimal_size_min, self.config.optimal_size_max);
        let size_score = if size >= min && size <= max {
            1.0
        } else if size < min {
            size as f32 / min.max(1) as f32
        } else {
            max as f32 / size as f32
        };

        cohesion * self.config.quality_cohesion_weight
            + size_score * self.config.quality_size_weight
            + density * self.config.quality_density_weight
            + stability * self.config.quality_stability_weight
    }
}

fn confidence(components: &ComponentScores, weights: &ComponentWeights) -> f32 {
    let weighted: Vec<f32> = components
        .as_array()
        .iter()
        .zip(weights.as_array())
        .map(|(s, w)| s * w)
        .collect();
    let mean = weighted.iter().sum::<f32>() / weighted.len() as f32;
    let variance =
        weighted.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / weighted.len() as f32;
    1.0 - (variance.sqrt() * 2.0).min(1.0)
}

fn lowercase_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
