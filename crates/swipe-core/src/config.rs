//! Engine configuration.
//!
//! Defaults live in the constants below so that tests, benches and the CLI
//! agree on them. [`EngineConfig`] groups every tunable into one
//! `serde`-deserializable tree; any field omitted from a config file falls back
//! to its default.
//!
//! # Usage
//!
//! ```
//! use swipe_core::config::{EngineConfig, EMBEDDING_DIM};
//!
//! let config = EngineConfig::default();
//! assert_eq!(config.embedding.dimension, EMBEDDING_DIM);
//! assert!(config.validate().is_ok());
//! ```

use crate::clustering::NoiseHandling;
use crate::error::EngineError;
use crate::types::InteractionType;
use crate::vector::DistanceKind;
use serde::{Deserialize, Serialize};

// =============================================================================
// Embedding Configuration
// =============================================================================

/// Dimension of every user and post embedding.
pub const EMBEDDING_DIM: usize = 128;

/// Sub-vector sizes of the user embedding, concatenated in this order before
/// resizing to [`EMBEDDING_DIM`].
pub const INTERACTION_HISTOGRAM_DIM: usize = 50;
pub const VIEWING_PATTERN_DIM: usize = 30;
pub const PREFERENCE_DIM: usize = 20;
pub const DEMOGRAPHIC_DIM: usize = 30;

/// Most-recent interactions considered when building a user embedding.
pub const USER_HISTORY_LIMIT: usize = 500;

/// A user embedding younger than this is reused instead of rebuilt.
pub const USER_RECENT_WINDOW_HOURS: i64 = 24;

/// A post embedding younger than this is skipped by the refresh job.
pub const ITEM_RECENT_WINDOW_HOURS: i64 = 7 * 24;

/// Share of the existing vector kept by an incremental update.
pub const EMBEDDING_BLEND_CURRENT: f32 = 0.7;

/// Share of the freshly built vector mixed in by an incremental update.
pub const EMBEDDING_BLEND_NEW: f32 = 0.3;

/// Divisor applied after `log10(1 + x)` engagement compression.
pub const ENGAGEMENT_LOG_SCALE: f32 = 5.0;

// =============================================================================
// Clustering Configuration
// =============================================================================

/// Neighborhood radius for DBSCAN (in distance units of the configured metric).
pub const DBSCAN_EPSILON: f32 = 0.3;

/// Minimum neighborhood size (the point itself included) for a core point.
pub const DBSCAN_MIN_POINTS: usize = 5;

/// Cosine similarity a new post needs to join an existing cluster.
pub const CLUSTER_ASSIGN_THRESHOLD: f32 = 0.5;

/// Scale applied to an interaction boost before it is added to a
/// user-cluster interaction score.
pub const RANK_BOOST_FACTOR: f32 = 0.2;

/// Score given to a freshly created user-cluster rank row.
pub const INITIAL_RANK_SCORE: f32 = 0.3;

// =============================================================================
// Batch Configuration
// =============================================================================

pub const EMBEDDING_REFRESH_INTERVAL_HOURS: u64 = 12;
pub const CLUSTERING_INTERVAL_HOURS: u64 = 24;
pub const BATCH_SIZE: usize = 100;
pub const MAX_ITEMS_PER_RUN: usize = 5000;

// =============================================================================
// Configuration Tree
// =============================================================================

/// Root configuration for the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub embedding: EmbeddingConfig,
    pub clustering: ClusteringConfig,
    pub ranking: RankingConfig,
    pub candidates: CandidateRankingConfig,
    pub matcher: MatcherConfig,
    pub selector: SelectorConfig,
    pub recommendation: RecommendationConfig,
    pub batch: BatchConfig,
}

impl EngineConfig {
    /// Parses a JSON document; missing sections use their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidInput(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: &str| Err(EngineError::InvalidInput(msg.to_string()));

        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be positive");
        }
        if self.embedding.blend_current < 0.0 || self.embedding.blend_new < 0.0 {
            return invalid("embedding blend ratios must be non-negative");
        }
        if self.clustering.epsilon <= 0.0 || !self.clustering.epsilon.is_finite() {
            return invalid("clustering.epsilon must be a positive number");
        }
        if self.clustering.min_points == 0 {
            return invalid("clustering.min_points must be at least 1");
        }
        if self.ranking.weights.as_array().iter().any(|w| *w < 0.0) {
            return invalid("ranking weights must be non-negative");
        }
        if self.ranking.weights.sum() <= 0.0 {
            return invalid("ranking weights must not all be zero");
        }
        if self.candidates.weights.as_array().iter().any(|w| *w < 0.0) {
            return invalid("candidate weights must be non-negative");
        }
        if self.candidates.diversify_buckets == 0 {
            return invalid("candidates.diversify_buckets must be at least 1");
        }
        if self.batch.batch_size == 0 {
            return invalid("batch.batch_size must be at least 1");
        }
        if self.batch.embedding_interval_hours == 0 || self.batch.clustering_interval_hours == 0 {
            return invalid("batch intervals must be at least one hour");
        }
        Ok(())
    }
}

/// Embedding construction and freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub dimension: usize,
    pub user_history_limit: usize,
    pub user_recent_window_hours: i64,
    pub item_recent_window_hours: i64,
    pub text_weight: f32,
    pub tag_weight: f32,
    pub engagement_weight: f32,
    pub blend_current: f32,
    pub blend_new: f32,
    pub engagement_log_scale: f32,
    /// Window used for the activeness factor stored in user metadata.
    pub activity_window_days: i64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimension: EMBEDDING_DIM,
            user_history_limit: USER_HISTORY_LIMIT,
            user_recent_window_hours: USER_RECENT_WINDOW_HOURS,
            item_recent_window_hours: ITEM_RECENT_WINDOW_HOURS,
            text_weight: 0.5,
            tag_weight: 0.3,
            engagement_weight: 0.2,
            blend_current: EMBEDDING_BLEND_CURRENT,
            blend_new: EMBEDDING_BLEND_NEW,
            engagement_log_scale: ENGAGEMENT_LOG_SCALE,
            activity_window_days: 30,
        }
    }
}

/// DBSCAN parameters and incremental cluster assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub epsilon: f32,
    pub min_points: usize,
    pub distance: DistanceKind,
    pub noise_handling: NoiseHandling,
    pub assign_threshold: f32,
    pub rank_boost_factor: f32,
    /// Most frequent member tags kept as cluster topics.
    pub max_topics: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            epsilon: DBSCAN_EPSILON,
            min_points: DBSCAN_MIN_POINTS,
            distance: DistanceKind::Cosine,
            noise_handling: NoiseHandling::SeparateCluster,
            assign_threshold: CLUSTER_ASSIGN_THRESHOLD,
            rank_boost_factor: RANK_BOOST_FACTOR,
            max_topics: 5,
        }
    }
}

/// Weights of the six cluster ranking components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentWeights {
    pub affinity: f32,
    pub engagement: f32,
    pub novelty: f32,
    pub diversity: f32,
    pub temporal: f32,
    pub quality: f32,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            affinity: 0.30,
            engagement: 0.25,
            novelty: 0.20,
            diversity: 0.10,
            temporal: 0.05,
            quality: 0.10,
        }
    }
}

impl ComponentWeights {
    /// Multipliers applied to the base weights for users with no history.
    pub fn new_user_modifiers() -> Self {
        Self {
            affinity: 0.8,
            engagement: 0.7,
            novelty: 1.5,
            diversity: 1.5,
            temporal: 1.2,
            quality: 1.3,
        }
    }

    /// Values in declaration order.
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

    pub fn sum(&self) -> f32 {
        self.as_array().iter().sum()
    }
}

/// Cluster-level ranking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: ComponentWeights,
    pub new_user_modifiers: ComponentWeights,
    /// Users above this many interactions count as power users.
    pub power_user_threshold: usize,
    pub embedding_similarity_weight: f32,
    /// Similarities below this floor are halved.
    pub similarity_floor: f32,
    pub engagement_normalization: f32,
    pub max_interactions: usize,
    pub novelty_window_days: f32,
    pub novelty_content_weight: f32,
    pub novelty_topic_weight: f32,
    pub recent_cluster_window: usize,
    pub diversity_topic_weight: f32,
    pub diversity_creator_weight: f32,
    pub diversity_format_weight: f32,
    /// Time constant of the content freshness decay.
    pub freshness_decay_hours: f32,
    pub optimal_size_min: usize,
    pub optimal_size_max: usize,
    pub quality_cohesion_weight: f32,
    pub quality_size_weight: f32,
    pub quality_density_weight: f32,
    pub quality_stability_weight: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            new_user_modifiers: ComponentWeights::new_user_modifiers(),
            power_user_threshold: 100,
            embedding_similarity_weight: 0.6,
            similarity_floor: 0.2,
            engagement_normalization: 0.1,
            max_interactions: 100,
            novelty_window_days: 30.0,
            novelty_content_weight: 0.7,
            novelty_topic_weight: 0.3,
            recent_cluster_window: 10,
            diversity_topic_weight: 0.5,
            diversity_creator_weight: 0.3,
            diversity_format_weight: 0.2,
            freshness_decay_hours: 48.0,
            optimal_size_min: 5,
            optimal_size_max: 50,
            quality_cohesion_weight: 0.4,
            quality_size_weight: 0.2,
            quality_density_weight: 0.2,
            quality_stability_weight: 0.2,
        }
    }
}

/// Weights of the five candidate ranking factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateWeights {
    pub relevance: f32,
    pub engagement: f32,
    pub novelty: f32,
    pub diversity: f32,
    pub context: f32,
}

impl Default for CandidateWeights {
    fn default() -> Self {
        Self {
            relevance: 0.40,
            engagement: 0.25,
            novelty: 0.15,
            diversity: 0.10,
            context: 0.10,
        }
    }
}

impl CandidateWeights {
    pub fn as_array(&self) -> [f32; 5] {
        [
            self.relevance,
            self.engagement,
            self.novelty,
            self.diversity,
            self.context,
        ]
    }

    pub fn sum(&self) -> f32 {
        self.as_array().iter().sum()
    }
}

/// Candidate-level ranking and diversification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRankingConfig {
    pub weights: CandidateWeights,
    /// Novelty level at which weights are left untouched.
    pub novelty_baseline: f32,
    /// Diversity level at which weights are left untouched.
    pub diversity_baseline: f32,
    pub novelty_decay_hours: f32,
    /// Weighted engagement count that maps to a score of 1.
    pub engagement_saturation: f32,
    pub diversify_threshold: f32,
    pub diversify_head_fraction: f32,
    pub diversify_buckets: usize,
}

impl Default for CandidateRankingConfig {
    fn default() -> Self {
        Self {
            weights: CandidateWeights::default(),
            novelty_baseline: 0.3,
            diversity_baseline: 0.4,
            novelty_decay_hours: 72.0,
            engagement_saturation: 100.0,
            diversify_threshold: 0.6,
            diversify_head_fraction: 0.3,
            diversify_buckets: 3,
        }
    }
}

/// Cluster matching for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub min_match_threshold: f32,
    /// Share of the match score taken by the contextual boost.
    pub context_weight: f32,
    pub max_clusters: usize,
    pub interest_boost: f32,
    pub interest_boost_cap: f32,
    pub active_time_boost: f32,
    pub location_boost: f32,
    pub language_boost: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_match_threshold: 0.2,
            context_weight: 0.2,
            max_clusters: 3,
            interest_boost: 0.1,
            interest_boost_cap: 0.3,
            active_time_boost: 0.2,
            location_boost: 0.15,
            language_boost: 0.15,
        }
    }
}

/// Candidate selection from matched clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Extra candidates pulled beyond the requested limit.
    pub buffer_size: usize,
    pub time_window_hours: i64,
    pub min_cluster_score: f32,
    pub cluster_score_weight: f32,
    pub recency_weight: f32,
    pub engagement_weight: f32,
    pub exploration_weight: f32,
    /// Fixed seed for the exploration jitter; random when absent.
    pub seed: Option<u64>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            buffer_size: 5,
            time_window_hours: 168,
            min_cluster_score: 0.2,
            cluster_score_weight: 0.4,
            recency_weight: 0.3,
            engagement_weight: 0.2,
            exploration_weight: 0.1,
            seed: None,
        }
    }
}

/// Request defaults and interaction handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub default_limit: usize,
    pub default_diversity: f32,
    pub default_novelty: f32,
    /// Interaction types that trigger a synchronous user-embedding recompute.
    pub significant_interactions: Vec<InteractionType>,
    pub cold_start_window_hours: i64,
    pub cold_start_pool: usize,
    /// Below this many recent posts the cold-start pool widens to any age.
    pub cold_start_min_recent: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            default_diversity: 0.4,
            default_novelty: 0.3,
            significant_interactions: vec![
                InteractionType::Like,
                InteractionType::Dislike,
                InteractionType::LikeComment,
                InteractionType::Share,
                InteractionType::Report,
            ],
            cold_start_window_hours: 24,
            cold_start_pool: 100,
            cold_start_min_recent: 10,
        }
    }
}

/// Periodic maintenance jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub embedding_interval_hours: u64,
    pub clustering_interval_hours: u64,
    pub batch_size: usize,
    pub max_items_per_run: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            embedding_interval_hours: EMBEDDING_REFRESH_INTERVAL_HOURS,
            clustering_interval_hours: CLUSTERING_INTERVAL_HOURS,
            batch_size: BATCH_SIZE,
            max_items_per_run: MAX_ITEMS_PER_RUN,
        }
    }
}
