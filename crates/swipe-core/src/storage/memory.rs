//! In-memory implementation of every repository trait.
//!
//! Stores everything in HashMaps behind `RwLock`s and persists nothing.
//! Concurrent writers to the same key resolve last-writer-wins.

use super::{
    embedding_key, ClusterRepository, ContentRepository, EmbeddingRepository,
    InteractionRepository, ProfileRepository, StoreError,
};
use crate::types::{
    ClusterInfo, ContentItem, Embedding, EntityKind, UserClusterRank, UserInteraction, UserProfile,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

fn poisoned<T>(e: PoisonError<T>) -> StoreError {
    StoreError::DatabaseError(format!("Lock poisoned: {}", e))
}

/// HashMap-backed store for tests and demos.
#[derive(Default)]
pub struct InMemoryStore {
    embeddings: RwLock<HashMap<String, Embedding>>,
    interactions: RwLock<Vec<UserInteraction>>,
    clusters: RwLock<BTreeMap<String, ClusterInfo>>,
    ranks: RwLock<HashMap<(String, String), UserClusterRank>>,
    content: RwLock<HashMap<String, ContentItem>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a post.
    pub fn insert_content(&self, item: ContentItem) -> Result<(), StoreError> {
        let mut content = self.content.write().map_err(poisoned)?;
        content.insert(item.id.clone(), item);
        Ok(())
    }

    /// Adds or replaces a user profile.
    pub fn insert_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        let mut profiles = self.profiles.write().map_err(poisoned)?;
        profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    /// Number of logged interactions.
    pub fn interaction_count(&self) -> Result<usize, StoreError> {
        Ok(self.interactions.read().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl EmbeddingRepository for InMemoryStore {
    async fn get_embedding(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<Embedding>, StoreError> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        Ok(embeddings.get(&embedding_key(kind, entity_id)).cloned())
    }

    async fn put_embedding(&self, embedding: &Embedding) -> Result<(), StoreError> {
        let mut embeddings = self.embeddings.write().map_err(poisoned)?;
        embeddings.insert(
            embedding_key(embedding.kind, &embedding.entity_id),
            embedding.clone(),
        );
        Ok(())
    }

    async fn list_embeddings(&self, kind: EntityKind) -> Result<Vec<Embedding>, StoreError> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        let mut out: Vec<Embedding> = embeddings
            .values()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        Ok(out)
    }
}

#[async_trait]
impl InteractionRepository for InMemoryStore {
    async fn append_interaction(&self, interaction: &UserInteraction) -> Result<(), StoreError> {
        let mut interactions = self.interactions.write().map_err(poisoned)?;
        interactions.push(interaction.clone());
        Ok(())
    }

    async fn interactions_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserInteraction>, StoreError> {
        let interactions = self.interactions.read().map_err(poisoned)?;
        Ok(interactions
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn interactions_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<UserInteraction>, StoreError> {
        let interactions = self.interactions.read().map_err(poisoned)?;
        let mut out: Vec<UserInteraction> = interactions
            .iter()
            .filter(|i| i.entity_id == entity_id)
            .cloned()
            .collect();
        out.sort_by_key(|i| i.timestamp);
        Ok(out)
    }
}

#[async_trait]
impl ClusterRepository for InMemoryStore {
    async fn get_cluster(&self, cluster_id: &str) -> Result<Option<ClusterInfo>, StoreError> {
        let clusters = self.clusters.read().map_err(poisoned)?;
        Ok(clusters.get(cluster_id).cloned())
    }

    async fn put_cluster(&self, cluster: &ClusterInfo) -> Result<(), StoreError> {
        let mut clusters = self.clusters.write().map_err(poisoned)?;
        clusters.insert(cluster.id.clone(), cluster.clone());
        Ok(())
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, StoreError> {
        let clusters = self.clusters.read().map_err(poisoned)?;
        Ok(clusters.values().cloned().collect())
    }

    async fn replace_clusters(&self, replacement: &[ClusterInfo]) -> Result<(), StoreError> {
        let mut clusters = self.clusters.write().map_err(poisoned)?;
        clusters.clear();
        for cluster in replacement {
            clusters.insert(cluster.id.clone(), cluster.clone());
        }
        Ok(())
    }

    async fn get_user_rank(
        &self,
        user_id: &str,
        cluster_id: &str,
    ) -> Result<Option<UserClusterRank>, StoreError> {
        let ranks = self.ranks.read().map_err(poisoned)?;
        Ok(ranks
            .get(&(user_id.to_string(), cluster_id.to_string()))
            .cloned())
    }

    async fn put_user_rank(&self, rank: &UserClusterRank) -> Result<(), StoreError> {
        let mut ranks = self.ranks.write().map_err(poisoned)?;
        ranks.insert(
            (rank.user_id.clone(), rank.cluster_id.clone()),
            rank.clone(),
        );
        Ok(())
    }

    async fn user_ranks(&self, user_id: &str) -> Result<Vec<UserClusterRank>, StoreError> {
        let ranks = self.ranks.read().map_err(poisoned)?;
        let mut out: Vec<UserClusterRank> = ranks
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));
        Ok(out)
    }
}

#[async_trait]
impl ContentRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<ContentItem>, StoreError> {
        let content = self.content.read().map_err(poisoned)?;
        Ok(content.get(id).cloned())
    }

    async fn find_recent_ids(&self, limit: usize) -> Result<Vec<String>, StoreError> {
        let content = self.content.read().map_err(poisoned)?;
        let mut items: Vec<&ContentItem> = content.values().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(items.into_iter().take(limit).map(|i| i.id.clone()).collect())
    }

    async fn find_tags_for(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let content = self.content.read().map_err(poisoned)?;
        Ok(content.get(id).map(|i| i.tags.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl ProfileRepository for InMemoryStore {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let profiles = self.profiles.read().map_err(poisoned)?;
        Ok(profiles.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbeddingVector, EngagementStats, EntityKind, InteractionType, Metadata};
    use chrono::{Duration, Utc};

    fn make_embedding(id: &str, kind: EntityKind) -> Embedding {
        Embedding {
            entity_id: id.to_string(),
            kind,
            vector: EmbeddingVector::new(vec![1.0, 0.0]),
            metadata: Metadata::new(),
            version: 1,
        }
    }

    #[tokio::test]
    async fn test_embeddings_are_keyed_by_kind() {
        let store = InMemoryStore::new();
        store
            .put_embedding(&make_embedding("42", EntityKind::User))
            .await
            .unwrap();

        assert!(store
            .get_embedding(EntityKind::User, "42")
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get_embedding(EntityKind::Post, "42")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.list_embeddings(EntityKind::User).await.unwrap().len(), 1);
        assert!(store.list_embeddings(EntityKind::Post).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interactions_filtered_by_user_and_entity() {
        let store = InMemoryStore::new();
        for (i, (user, entity)) in [("u1", "p1"), ("u2", "p1"), ("u1", "p2")].iter().enumerate() {
            store
                .append_interaction(&UserInteraction {
                    id: format!("i{}", i),
                    user_id: user.to_string(),
                    entity_id: entity.to_string(),
                    entity_type: EntityKind::Post,
                    interaction_type: InteractionType::Like,
                    timestamp: Utc::now(),
                    metadata: Metadata::new(),
                })
                .await
                .unwrap();
        }

        assert_eq!(store.interactions_for_user("u1").await.unwrap().len(), 2);
        assert_eq!(store.interactions_for_entity("p1").await.unwrap().len(), 2);
        assert_eq!(store.interaction_count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_recent_ids_newest_first() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        for (id, age) in [("old", 48), ("new", 1), ("mid", 10)] {
            store
                .insert_content(ContentItem {
                    id: id.to_string(),
                    author_id: "a".to_string(),
                    text: String::new(),
                    tags: vec![],
                    engagement: EngagementStats::default(),
                    created_at: now - Duration::hours(age),
                    metadata: Metadata::new(),
                })
                .unwrap();
        }

        assert_eq!(
            store.find_recent_ids(2).await.unwrap(),
            vec!["new".to_string(), "mid".to_string()]
        );
    }
}
