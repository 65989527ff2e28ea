//! Test utilities for swipe-core.
//!
//! Shared fixtures for unit tests. Only compiled when running tests.

use crate::storage::{
    ClusterRepository, ContentRepository, EmbeddingRepository, InteractionRepository,
    ProfileRepository, StoreError,
};
use crate::types::{
    ClusterInfo, ContentItem, Embedding, EmbeddingVector, EngagementStats, EntityKind,
    InteractionType, Metadata, UserClusterRank, UserInteraction, UserProfile,
};
use crate::vector::normalize_l2;
use async_trait::async_trait;
use chrono::{Duration, Utc};

/// Store whose every operation fails, for exercising error paths.
pub struct FailingStore;

fn unavailable<T>() -> Result<T, StoreError> {
    Err(StoreError::DatabaseError("store offline".to_string()))
}

#[async_trait]
impl EmbeddingRepository for FailingStore {
    async fn get_embedding(&self, _: EntityKind, _: &str) -> Result<Option<Embedding>, StoreError> {
        unavailable()
    }
    async fn put_embedding(&self, _: &Embedding) -> Result<(), StoreError> {
        unavailable()
    }
    async fn list_embeddings(&self, _: EntityKind) -> Result<Vec<Embedding>, StoreError> {
        unavailable()
    }
}

#[async_trait]
impl InteractionRepository for FailingStore {
    async fn append_interaction(&self, _: &UserInteraction) -> Result<(), StoreError> {
        unavailable()
    }
    async fn interactions_for_user(&self, _: &str) -> Result<Vec<UserInteraction>, StoreError> {
        unavailable()
    }
    async fn interactions_for_entity(&self, _: &str) -> Result<Vec<UserInteraction>, StoreError> {
        unavailable()
    }
}

#[async_trait]
impl ClusterRepository for FailingStore {
    async fn get_cluster(&self, _: &str) -> Result<Option<ClusterInfo>, StoreError> {
        unavailable()
    }
    async fn put_cluster(&self, _: &ClusterInfo) -> Result<(), StoreError> {
        unavailable()
    }
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, StoreError> {
        unavailable()
    }
    async fn replace_clusters(&self, _: &[ClusterInfo]) -> Result<(), StoreError> {
        unavailable()
    }
    async fn get_user_rank(&self, _: &str, _: &str) -> Result<Option<UserClusterRank>, StoreError> {
        unavailable()
    }
    async fn put_user_rank(&self, _: &UserClusterRank) -> Result<(), StoreError> {
        unavailable()
    }
    async fn user_ranks(&self, _: &str) -> Result<Vec<UserClusterRank>, StoreError> {
        unavailable()
    }
}

#[async_trait]
impl ContentRepository for FailingStore {
    async fn find_by_id(&self, _: &str) -> Result<Option<ContentItem>, StoreError> {
        unavailable()
    }
    async fn find_recent_ids(&self, _: usize) -> Result<Vec<String>, StoreError> {
        unavailable()
    }
    async fn find_tags_for(&self, _: &str) -> Result<Vec<String>, StoreError> {
        unavailable()
    }
}

#[async_trait]
impl ProfileRepository for FailingStore {
    async fn find_profile(&self, _: &str) -> Result<Option<UserProfile>, StoreError> {
        unavailable()
    }
}

/// Unit vector pointing along `values`.
pub fn unit(values: &[f32]) -> Vec<f32> {
    normalize_l2(values)
}

/// Cluster with the given centroid direction, members and topics.
pub fn make_cluster(id: &str, centroid: &[f32], members: &[&str], topics: &[&str]) -> ClusterInfo {
    let now = Utc::now();
    ClusterInfo {
        id: id.to_string(),
        name: id.to_string(),
        centroid: EmbeddingVector::new(unit(centroid)),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        member_ids: members.iter().map(|m| m.to_string()).collect(),
        size: members.len(),
        density: members.len() as f32 / (std::f32::consts::PI * 0.09),
        metadata: Metadata::new(),
        created_at: now,
        updated_at: now,
    }
}

/// Post created `hours_ago` hours ago.
pub fn make_post(id: &str, text: &str, tags: &[&str], hours_ago: i64) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        author_id: format!("author-{}", id),
        text: text.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        engagement: EngagementStats {
            views: 100,
            likes: 10,
            comments: 2,
            shares: 1,
            saves: 0,
        },
        created_at: Utc::now() - Duration::hours(hours_ago),
        metadata: Metadata::new(),
    }
}

/// Logged interaction `hours_ago` hours ago.
pub fn make_interaction(
    user: &str,
    entity: &str,
    interaction_type: InteractionType,
    hours_ago: i64,
) -> UserInteraction {
    UserInteraction {
        id: format!("{}-{}-{}", user, entity, hours_ago),
        user_id: user.to_string(),
        entity_id: entity.to_string(),
        entity_type: EntityKind::Post,
        interaction_type,
        timestamp: Utc::now() - Duration::hours(hours_ago),
        metadata: Metadata::new(),
    }
}
