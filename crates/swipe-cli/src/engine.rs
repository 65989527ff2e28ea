//! Engine wiring and command execution.

use crate::config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swipe_core::batch::{BatchProcessor, BatchRunReport, ForcedUpdate};
use swipe_core::embedding::HashingEmbeddingModel;
use swipe_core::recommendation::{RecommendationCoordinator, Repositories};
use swipe_core::storage::RedbStore;
use swipe_core::types::{
    ContentItem, EntityKind, InteractionType, Metadata, Recommendation, RecommendationContext,
    UserInteraction,
};
use tracing::{info, warn};

/// An opened database and the engine running on it.
pub struct Engine {
    store: Arc<RedbStore>,
    coordinator: Arc<RecommendationCoordinator>,
}

/// Outcome of an `ingest` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub posts: usize,
    pub embedded: usize,
    pub failed: usize,
    /// Cluster memberships created for the new posts
    pub cluster_assignments: usize,
}

/// Opens the database and builds the engine.
pub fn open(data_dir: Option<&PathBuf>, config_path: Option<&PathBuf>) -> Result<Engine> {
    let engine_config = config::load_engine_config(config_path)?;
    let db_path = config::database_path(data_dir)?;
    let store = Arc::new(
        RedbStore::open(&db_path)
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?,
    );
    let model = Arc::new(HashingEmbeddingModel::new(engine_config.embedding.dimension));
    let coordinator = RecommendationCoordinator::new(
        Repositories::shared(store.clone()),
        model,
        engine_config,
    )
    .context("Failed to build recommendation engine")?;

    info!(path = %db_path.display(), "Opened database");
    Ok(Engine {
        store,
        coordinator: Arc::new(coordinator),
    })
}

/// Stores every post of a JSON array, then embeds it and assigns it to
/// existing clusters. A post that fails to embed is counted, not fatal.
pub async fn ingest(engine: &Engine, file: &Path) -> Result<IngestSummary> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read posts file: {}", file.display()))?;
    let posts: Vec<ContentItem> = serde_json::from_str(&json)
        .with_context(|| format!("Invalid posts file: {}", file.display()))?;

    let mut summary = IngestSummary {
        posts: posts.len(),
        ..Default::default()
    };
    for post in &posts {
        engine
            .store
            .put_content(post)
            .with_context(|| format!("Failed to store post {}", post.id))?;
    }
    for post in &posts {
        match engine.coordinator.process_new_post(&post.id).await {
            Ok(joined) => {
                summary.embedded += 1;
                summary.cluster_assignments += joined.len();
            }
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "Failed to embed post");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

pub async fn interact(
    engine: &Engine,
    user: &str,
    entity: &str,
    entity_type: &str,
    interaction_type: &str,
) -> Result<UserInteraction> {
    let interaction_type: InteractionType = interaction_type.parse()?;
    let entity_type: EntityKind = entity_type.parse()?;
    engine
        .coordinator
        .process_interaction(user, entity, entity_type, interaction_type, Metadata::new())
        .await
        .context("Failed to record interaction")
}

/// Recommendations for `user` in the current time context.
pub async fn recommend(engine: &Engine, user: &str, limit: usize) -> Result<Vec<Recommendation>> {
    let mut options = engine.coordinator.default_options();
    options.limit = limit;
    options.context = Some(RecommendationContext::at(chrono::Utc::now()));
    engine
        .coordinator
        .get_recommendations(user, &options)
        .await
        .context("Failed to compute recommendations")
}

pub async fn cluster(engine: &Engine) -> Result<Option<BatchRunReport>> {
    BatchProcessor::new(engine.coordinator.clone())
        .run_clustering()
        .await
        .context("Re-clustering failed")
}

pub async fn batch(engine: &Engine) -> Result<ForcedUpdate> {
    BatchProcessor::new(engine.coordinator.clone())
        .force_update()
        .await
        .context("Batch run failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const POSTS: &str = r#"[
        { "id": "p1", "author_id": "a1", "text": "sourdough bread at home",
          "tags": ["food"], "created_at": "2024-05-01T10:00:00Z" },
        { "id": "p2", "author_id": "a2", "text": "",
          "created_at": "2024-05-01T11:00:00Z" }
    ]"#;

    #[tokio::test]
    async fn test_ingest_and_interact() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().to_path_buf();
        let engine = open(Some(&data_dir), None).unwrap();

        let posts = temp.path().join("posts.json");
        std::fs::write(&posts, POSTS).unwrap();
        let summary = ingest(&engine, &posts).await.unwrap();
        assert_eq!(summary.posts, 2);
        assert_eq!(summary.embedded, 1);
        assert_eq!(summary.failed, 1);

        let logged = interact(&engine, "u1", "p1", "post", "like").await.unwrap();
        assert_eq!(logged.interaction_type, InteractionType::Like);
        assert!(interact(&engine, "u1", "p1", "post", "poke").await.is_err());
    }

    #[tokio::test]
    async fn test_recommend_on_empty_database() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().to_path_buf();
        let engine = open(Some(&data_dir), None).unwrap();
        let recs = recommend(&engine, "u1", 5).await.unwrap();
        assert!(recs.is_empty());
    }
}
