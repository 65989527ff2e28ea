//! Embedding construction and versioned storage.
//!
//! - [`EmbeddingModel`] / [`HashingEmbeddingModel`] - text to vector
//! - [`EmbeddingBuilder`] - shared build/update/validate contract
//! - [`UserEmbeddingBuilder`] and [`PostEmbeddingBuilder`] - the two variants
//! - [`EmbeddingStore`] - versioning and freshness on top of an
//!   [`EmbeddingRepository`]

mod model;
mod post;
mod traits;
mod user;

pub use model::{EmbeddingModel, HashingEmbeddingModel};
pub use post::PostEmbeddingBuilder;
pub use traits::{blend, EmbeddingBuilder};
pub use user::{UserEmbeddingBuilder, UserSignals};

use crate::config::EmbeddingConfig;
use crate::error::EngineError;
use crate::storage::EmbeddingRepository;
use crate::types::{Embedding, EmbeddingVector, EntityKind, Metadata};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

/// Versioned access to embeddings.
///
/// Every upsert increments the entity's version and stamps `updated_at`;
/// embeddings are only ever superseded, never deleted.
pub struct EmbeddingStore {
    repo: Arc<dyn EmbeddingRepository>,
    user_window: Duration,
    item_window: Duration,
}

impl EmbeddingStore {
    pub fn new(repo: Arc<dyn EmbeddingRepository>, config: &EmbeddingConfig) -> Self {
        Self {
            repo,
            user_window: Duration::hours(config.user_recent_window_hours),
            item_window: Duration::hours(config.item_recent_window_hours),
        }
    }

    /// Returns the embedding or [`EngineError::NotFound`].
    pub async fn get(&self, kind: EntityKind, entity_id: &str) -> Result<Embedding, EngineError> {
        self.find(kind, entity_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("{} embedding {}", kind, entity_id)))
    }

    /// Like [`get`](Self::get) but absent embeddings are `Ok(None)`.
    pub async fn find(
        &self,
        kind: EntityKind,
        entity_id: &str,
    ) -> Result<Option<Embedding>, EngineError> {
        Ok(self.repo.get_embedding(kind, entity_id).await?)
    }

    /// Stores `vector` as the entity's current embedding.
    pub async fn upsert(
        &self,
        kind: EntityKind,
        entity_id: &str,
        vector: EmbeddingVector,
        metadata: Metadata,
    ) -> Result<Embedding, EngineError> {
        if vector.values.len() != vector.dimension {
            return Err(EngineError::InvalidInput(format!(
                "embedding declares dimension {} but has {} values",
                vector.dimension,
                vector.values.len()
            )));
        }

        let previous = self.repo.get_embedding(kind, entity_id).await?;
        let now = Utc::now();
        let (version, created_at) = match &previous {
            Some(p) => (p.version + 1, p.vector.created_at),
            None => (1, now),
        };

        let embedding = Embedding {
            entity_id: entity_id.to_string(),
            kind,
            vector: EmbeddingVector {
                created_at,
                updated_at: now,
                ..vector
            },
            metadata,
            version,
        };
        self.repo.put_embedding(&embedding).await?;
        debug!(%kind, entity_id, version, "Stored embedding");
        Ok(embedding)
    }

    /// Freshness window for `kind`.
    pub fn recent_window(&self, kind: EntityKind) -> Duration {
        match kind {
            EntityKind::User => self.user_window,
            EntityKind::Post => self.item_window,
        }
    }

    /// True when an embedding updated at `updated_at` can be reused.
    pub fn is_recent(&self, kind: EntityKind, updated_at: DateTime<Utc>) -> bool {
        self.is_recent_at(kind, updated_at, Utc::now())
    }

    pub fn is_recent_at(
        &self,
        kind: EntityKind,
        updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> bool {
        now - updated_at < self.recent_window(kind)
    }

    /// All embeddings of `kind`.
    pub async fn all(&self, kind: EntityKind) -> Result<Vec<Embedding>, EngineError> {
        Ok(self.repo.list_embeddings(kind).await?)
    }

    /// Up to `limit` embeddings of `kind` outside the freshness window,
    /// stalest first.
    pub async fn list_stale(
        &self,
        kind: EntityKind,
        limit: usize,
    ) -> Result<Vec<Embedding>, EngineError> {
        let now = Utc::now();
        let mut stale: Vec<Embedding> = self
            .repo
            .list_embeddings(kind)
            .await?
            .into_iter()
            .filter(|e| !self.is_recent_at(kind, e.updated_at(), now))
            .collect();
        stale.sort_by_key(|e| e.updated_at());
        stale.truncate(limit);
        Ok(stale)
    }
}
