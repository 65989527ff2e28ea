//! Core data model: embeddings, interactions, clusters, content and
//! recommendation requests.

use crate::error::EngineError;
use crate::vector;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Free-form metadata attached to embeddings, clusters and events.
pub type Metadata = Map<String, Value>;

// =============================================================================
// Entities
// =============================================================================

/// The two kinds of entity that carry embeddings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Post,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Post => "post",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(EntityKind::User),
            "post" => Ok(EntityKind::Post),
            other => Err(EngineError::InvalidInput(format!(
                "Unknown entity type: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Embeddings
// =============================================================================

/// A fixed-dimension vector with timestamps.
///
/// `values.len() == dimension` always holds. Builders L2-normalize their
/// output; the zero vector stands for "no signal".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub dimension: usize,
    pub values: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingVector {
    /// Wraps `values`, stamping both timestamps with the current time.
    pub fn new(values: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            dimension: values.len(),
            values,
            created_at: now,
            updated_at: now,
        }
    }

    /// Zero vector of `dimension` elements.
    pub fn zeros(dimension: usize) -> Self {
        Self::new(vec![0.0; dimension])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn is_zero(&self) -> bool {
        vector::is_zero(&self.values)
    }
}

/// A versioned embedding owned by the embedding store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub entity_id: String,
    pub kind: EntityKind,
    pub vector: EmbeddingVector,
    pub metadata: Metadata,
    /// Incremented on every upsert; never reset.
    pub version: u64,
}

impl Embedding {
    pub fn values(&self) -> &[f32] {
        &self.vector.values
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.vector.updated_at
    }
}

// =============================================================================
// Interactions
// =============================================================================

/// Kind of user action, ordered from weakest to strongest signal.
///
/// `Dislike` and `Report` form the negative band between views and likes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    ShortView,
    LongView,
    Dislike,
    Report,
    Like,
    LikeComment,
    Comment,
    Save,
    Share,
}

impl InteractionType {
    pub const ALL: [InteractionType; 9] = [
        InteractionType::ShortView,
        InteractionType::LongView,
        InteractionType::Dislike,
        InteractionType::Report,
        InteractionType::Like,
        InteractionType::LikeComment,
        InteractionType::Comment,
        InteractionType::Save,
        InteractionType::Share,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::ShortView => "short_view",
            InteractionType::LongView => "long_view",
            InteractionType::Dislike => "dislike",
            InteractionType::Report => "report",
            InteractionType::Like => "like",
            InteractionType::LikeComment => "like_comment",
            InteractionType::Comment => "comment",
            InteractionType::Save => "save",
            InteractionType::Share => "share",
        }
    }

    /// Signed weight before time decay.
    pub fn base_weight(&self) -> f32 {
        match self {
            InteractionType::ShortView => 0.5,
            InteractionType::LongView => 1.0,
            InteractionType::Dislike => -0.5,
            InteractionType::Report => -1.0,
            InteractionType::Like => 2.0,
            InteractionType::LikeComment => 2.5,
            InteractionType::Comment => 3.0,
            InteractionType::Save => 3.5,
            InteractionType::Share => 4.0,
        }
    }

    /// Hours after which the decayed weight has halved.
    pub fn half_life_hours(&self) -> f32 {
        match self {
            InteractionType::ShortView => 24.0,
            InteractionType::LongView | InteractionType::Dislike | InteractionType::Report => 48.0,
            InteractionType::Like => 168.0,
            InteractionType::LikeComment => 192.0,
            InteractionType::Comment | InteractionType::Share => 336.0,
            InteractionType::Save => 720.0,
        }
    }

    /// Amount a single interaction moves the user's rank for the clusters
    /// containing the entity.
    pub fn rank_boost(&self) -> f32 {
        match self {
            InteractionType::Like => 0.5,
            InteractionType::Share => 0.8,
            InteractionType::LongView => 0.3,
            InteractionType::Comment => 0.6,
            InteractionType::Dislike => -0.5,
            InteractionType::Report => -1.0,
            _ => 0.1,
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, InteractionType::Dislike | InteractionType::Report)
    }

    /// Position in [`InteractionType::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InteractionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EngineError::InvalidInput(format!("Unknown interaction type: {}", s)))
    }
}

/// A logged interaction. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub id: String,
    pub user_id: String,
    pub entity_id: String,
    pub entity_type: EntityKind,
    pub interaction_type: InteractionType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl UserInteraction {
    /// Age in fractional hours relative to `now`, never negative.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f32 {
        ((now - self.timestamp).num_seconds().max(0) as f32) / 3600.0
    }
}

/// An interaction before it is logged; id and timestamp are assigned on append
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: Option<String>,
    pub user_id: String,
    pub entity_id: String,
    pub entity_type: EntityKind,
    pub interaction_type: InteractionType,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl InteractionEvent {
    pub fn new(
        user_id: impl Into<String>,
        entity_id: impl Into<String>,
        entity_type: EntityKind,
        interaction_type: InteractionType,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            entity_id: entity_id.into(),
            entity_type,
            interaction_type,
            timestamp: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Classifies a view by how much of the content was watched.
///
/// Complete views (30 seconds or more, or at least 80% watched) count as
/// [`InteractionType::LongView`].
pub fn classify_view(duration_secs: f32, watch_fraction: f32) -> InteractionType {
    if duration_secs >= 30.0 || watch_fraction >= 0.8 {
        InteractionType::LongView
    } else {
        InteractionType::ShortView
    }
}

// =============================================================================
// Clusters
// =============================================================================

/// A group of posts produced by a clustering pass.
///
/// `size == member_ids.len()` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub id: String,
    pub name: String,
    pub centroid: EmbeddingVector,
    pub topics: Vec<String>,
    pub member_ids: Vec<String>,
    pub size: usize,
    pub density: f32,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClusterInfo {
    pub fn contains(&self, item_id: &str) -> bool {
        self.member_ids.iter().any(|m| m == item_id)
    }

    /// Appends `item_id` unless already a member. Returns whether it was added.
    pub fn add_member(&mut self, item_id: &str) -> bool {
        if self.contains(item_id) {
            return false;
        }
        self.member_ids.push(item_id.to_string());
        self.size = self.member_ids.len();
        self.updated_at = Utc::now();
        true
    }

    /// Numeric metadata entry, if present.
    pub fn metadata_f32(&self, key: &str) -> Option<f32> {
        self.metadata.get(key).and_then(Value::as_f64).map(|v| v as f32)
    }

    /// Author ids recorded for the members, if the clustering pass stored them.
    pub fn creators(&self) -> HashSet<String> {
        self.metadata
            .get("creators")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Per-(user, cluster) affinity row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserClusterRank {
    pub user_id: String,
    pub cluster_id: String,
    pub score: f32,
    pub similarity: f32,
    pub interaction_score: f32,
    pub match_score: f32,
    pub is_active: bool,
    pub last_interaction_date: DateTime<Utc>,
}

// =============================================================================
// Content
// =============================================================================

/// Raw engagement counters of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementStats {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub saves: u64,
}

impl EngagementStats {
    /// Interactions (excluding views) per view; 0 without views.
    pub fn engagement_rate(&self) -> f32 {
        if self.views == 0 {
            return 0.0;
        }
        (self.likes + self.comments + self.shares + self.saves) as f32 / self.views as f32
    }

    pub fn is_empty(&self) -> bool {
        *self == EngagementStats::default()
    }
}

/// A post as provided by the content repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub author_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub engagement: EngagementStats,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

// =============================================================================
// Users
// =============================================================================

/// Aggregated viewing behavior for one content category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewingPattern {
    pub category: String,
    pub avg_duration_secs: f32,
    pub completion_rate: f32,
    /// Views per week.
    pub frequency: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub location: Option<String>,
    pub language: Option<String>,
}

/// What the surrounding system knows about a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub user_id: String,
    pub interests: Vec<String>,
    pub viewing_patterns: Vec<ViewingPattern>,
    /// Clusters the user consumed most recently, newest first.
    pub recent_cluster_ids: Vec<String>,
    pub demographics: Option<Demographics>,
    /// Hours of day (0-23) the user is usually active.
    pub active_hours: Vec<u32>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Request context used by temporal scoring and contextual matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationContext {
    /// Hour of day, 0-23.
    pub time_of_day: Option<u32>,
    /// Day of week, 0 = Sunday.
    pub day_of_week: Option<u32>,
    pub location: Option<String>,
    pub language: Option<String>,
}

impl RecommendationContext {
    /// Context with hour and weekday taken from `at`.
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            time_of_day: Some(at.hour()),
            day_of_week: Some(at.weekday().num_days_from_sunday()),
            ..Default::default()
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.day_of_week, Some(0) | Some(6))
    }
}

/// Options of a recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOptions {
    pub limit: usize,
    #[serde(default)]
    pub exclude_ids: HashSet<String>,
    /// 0-1; at 0.6 and above results are interleaved for variety.
    pub diversity: f32,
    /// 0-1; shifts weight from relevance toward fresh content.
    pub novelty: f32,
    #[serde(default)]
    pub context: Option<RecommendationContext>,
}

impl Default for RecommendationOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            exclude_ids: HashSet::new(),
            diversity: 0.4,
            novelty: 0.3,
            context: None,
        }
    }
}

/// Where a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    /// Cluster matching followed by candidate ranking
    Clusters,
    /// Recent popular content for users without usable signal
    ColdStart,
}

/// One entry of a recommendation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub entity_id: String,
    pub entity_type: EntityKind,
    pub score: f32,
    pub timestamp: DateTime<Utc>,
    pub source: RecommendationSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}
