//! Repository traits for everything the engine persists or reads.
//!
//! The engine never talks to a database directly. Each entity kind has its own
//! repository trait, and the surrounding system supplies implementations:
//!
//! - [`EmbeddingRepository`] - versioned user and post embeddings
//! - [`InteractionRepository`] - append-only interaction events
//! - [`ClusterRepository`] - clusters and per-user cluster ranks
//! - [`ContentRepository`] - read-only post lookups
//! - [`ProfileRepository`] - read-only user profile lookups
//!
//! # Implementations
//!
//! - [`InMemoryStore`] - HashMap-backed, used by tests and demos
//! - `RedbStore` - redb-backed, behind the `redb-store` feature
//!
//! All traits require `Send + Sync` so one store can be shared behind an
//! `Arc` by request handlers and the batch scheduler.

mod memory;

#[cfg(feature = "redb-store")]
mod redb_store;

pub use memory::InMemoryStore;

#[cfg(feature = "redb-store")]
pub use redb_store::RedbStore;

use crate::types::{
    ClusterInfo, ContentItem, Embedding, EntityKind, UserClusterRank, UserInteraction, UserProfile,
};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error (redb, lock poisoning)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Store not initialized
    #[error("Store not initialized")]
    NotInitialized,
}

/// Key under which an embedding is stored.
pub(crate) fn embedding_key(kind: EntityKind, entity_id: &str) -> String {
    format!("{}:{}", kind.as_str(), entity_id)
}

/// Versioned embeddings for users and posts.
#[async_trait]
pub trait EmbeddingRepository: Send + Sync {
    /// Returns `Ok(None)` if the entity has no embedding yet.
    async fn get_embedding(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<Embedding>, StoreError>;

    /// Stores an embedding, overwriting any previous one for the same entity.
    ///
    /// Versioning is the caller's concern; the repository stores what it is given.
    async fn put_embedding(&self, embedding: &Embedding) -> Result<(), StoreError>;

    /// Returns every embedding of the given kind.
    async fn list_embeddings(&self, kind: EntityKind) -> Result<Vec<Embedding>, StoreError>;
}

/// Append-only interaction storage.
#[async_trait]
pub trait InteractionRepository: Send + Sync {
    /// Persists an event. Must not return `Ok` unless the event is durable.
    async fn append_interaction(&self, interaction: &UserInteraction) -> Result<(), StoreError>;

    /// All events of a user, in append order.
    async fn interactions_for_user(&self, user_id: &str)
        -> Result<Vec<UserInteraction>, StoreError>;

    /// All events targeting an entity, oldest first.
    async fn interactions_for_entity(
        &self,
        entity_id: &str,
    ) -> Result<Vec<UserInteraction>, StoreError>;
}

/// Clusters and user-cluster ranks.
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn get_cluster(&self, cluster_id: &str) -> Result<Option<ClusterInfo>, StoreError>;

    /// Inserts or overwrites a single cluster.
    async fn put_cluster(&self, cluster: &ClusterInfo) -> Result<(), StoreError>;

    /// All clusters, ordered by id.
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, StoreError>;

    /// Atomically replaces the full cluster set. Rank rows are kept.
    async fn replace_clusters(&self, clusters: &[ClusterInfo]) -> Result<(), StoreError>;

    async fn get_user_rank(
        &self,
        user_id: &str,
        cluster_id: &str,
    ) -> Result<Option<UserClusterRank>, StoreError>;

    async fn put_user_rank(&self, rank: &UserClusterRank) -> Result<(), StoreError>;

    /// All rank rows of a user.
    async fn user_ranks(&self, user_id: &str) -> Result<Vec<UserClusterRank>, StoreError>;
}

/// Read-only post lookups provided by the surrounding system.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<ContentItem>, StoreError>;

    /// Ids of the newest posts, newest first.
    async fn find_recent_ids(&self, limit: usize) -> Result<Vec<String>, StoreError>;

    async fn find_tags_for(&self, id: &str) -> Result<Vec<String>, StoreError>;
}

/// Read-only user profile lookups provided by the surrounding system.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;
}
