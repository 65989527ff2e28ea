//! The request-path pipeline and interaction handling.

use super::matcher::{ClusterMatch, ClusterMatcher};
use super::selector::CandidateSelector;
use crate::clustering::ClusterStore;
use crate::config::EngineConfig;
use crate::embedding::{
    EmbeddingBuilder, EmbeddingModel, EmbeddingStore, PostEmbeddingBuilder, UserEmbeddingBuilder,
    UserSignals,
};
use crate::error::EngineError;
use crate::interaction::InteractionLog;
use crate::ranking::{CandidateRanker, ClusterRanker, RankedCandidate, UserRankingInput};
use crate::storage::{
    ClusterRepository, ContentRepository, EmbeddingRepository, InteractionRepository,
    ProfileRepository,
};
use crate::types::{
    ContentItem, Embedding, EntityKind, InteractionEvent, InteractionType, Metadata,
    Recommendation, RecommendationOptions, RecommendationSource, UserInteraction, UserProfile,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Stages of [`RecommendationCoordinator::get_recommendations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    EnsureEmbedding,
    SelectClusters,
    SelectCandidates,
    Rank,
    Return,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::EnsureEmbedding => "ensure_embedding",
            PipelineStage::SelectClusters => "select_clusters",
            PipelineStage::SelectCandidates => "select_candidates",
            PipelineStage::Rank => "rank",
            PipelineStage::Return => "return",
        };
        f.write_str(name)
    }
}

/// The repositories the engine runs on.
#[derive(Clone)]
pub struct Repositories {
    pub embeddings: Arc<dyn EmbeddingRepository>,
    pub interactions: Arc<dyn InteractionRepository>,
    pub clusters: Arc<dyn ClusterRepository>,
    pub content: Arc<dyn ContentRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

impl Repositories {
    /// Uses one store for every repository.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: EmbeddingRepository
            + InteractionRepository
            + ClusterRepository
            + ContentRepository
            + ProfileRepository
            + 'static,
    {
        Self {
            embeddings: store.clone(),
            interactions: store.clone(),
            clusters: store.clone(),
            content: store.clone(),
            profiles: store,
        }
    }
}

/// What the cluster stage hands to candidate selection.
enum ClusterSelection {
    Clusters(Vec<(ClusterMatch, f32)>),
    ColdStart,
}

/// Entry point of the engine.
///
/// Owns every component and wires them to the injected repositories;
/// construct one per process and share it behind an `Arc`.
pub struct RecommendationCoordinator {
    config: EngineConfig,
    embeddings: EmbeddingStore,
    interactions: InteractionLog,
    clusters: ClusterStore,
    content: Arc<dyn ContentRepository>,
    profiles: Arc<dyn ProfileRepository>,
    user_builder: UserEmbeddingBuilder,
    post_builder: PostEmbeddingBuilder,
    matcher: ClusterMatcher,
    selector: CandidateSelector,
    cluster_ranker: ClusterRanker,
    candidate_ranker: CandidateRanker,
}

impl RecommendationCoordinator {
    /// Validates `config` and wires every component.
    pub fn new(
        repos: Repositories,
        model: Arc<dyn EmbeddingModel>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            embeddings: EmbeddingStore::new(repos.embeddings.clone(), &config.embedding),
            interactions: InteractionLog::new(repos.interactions),
            clusters: ClusterStore::new(repos.clusters, config.clustering.clone()),
            selector: CandidateSelector::new(
                repos.content.clone(),
                repos.embeddings,
                config.selector.clone(),
            ),
            content: repos.content,
            profiles: repos.profiles,
            user_builder: UserEmbeddingBuilder::new(config.embedding.clone()),
            post_builder: PostEmbeddingBuilder::new(config.embedding.clone(), model),
            matcher: ClusterMatcher::new(config.matcher.clone()),
            cluster_ranker: ClusterRanker::new(config.ranking.clone()),
            candidate_ranker: CandidateRanker::new(config.candidates.clone()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn embeddings(&self) -> &EmbeddingStore {
        &self.embeddings
    }

    pub fn interactions(&self) -> &InteractionLog {
        &self.interactions
    }

    pub fn clusters(&self) -> &ClusterStore {
        &self.clusters
    }

    pub fn content(&self) -> &Arc<dyn ContentRepository> {
        &self.content
    }

    /// Options filled with the configured defaults.
    pub fn default_options(&self) -> RecommendationOptions {
        RecommendationOptions {
            limit: self.config.recommendation.default_limit,
            diversity: self.config.recommendation.default_diversity,
            novelty: self.config.recommendation.default_novelty,
            ..Default::default()
        }
    }

    // =========================================================================
    // Recommendations
    // =========================================================================

    /// Recommends posts for `user_id`.
    ///
    /// Runs ensure-embedding, cluster selection, candidate selection and
    /// ranking. A failing stage yields an empty list (logged), except
    /// ranking, which degrades to neutral scores. Users without embedding
    /// signal or without matching clusters get recent popular content.
    /// Only an empty `user_id` is an error.
    #[instrument(skip_all, fields(user_id = %user_id, limit = options.limit))]
    pub async fn get_recommendations(
        &self,
        user_id: &str,
        options: &RecommendationOptions,
    ) -> Result<Vec<Recommendation>, EngineError> {
        if user_id.is_empty() {
            return Err(EngineError::InvalidInput("user id is required".to_string()));
        }
        if options.limit == 0 {
            return Ok(Vec::new());
        }
        let now = Utc::now();

        let embedding = match self.ensure_user_embedding(user_id).await {
            Ok(e) => e,
            Err(e) => return Ok(self.stage_failed(PipelineStage::EnsureEmbedding, &e)),
        };
        let profile = match self.profile_or_default(user_id).await {
            Ok(p) => p,
            Err(e) => return Ok(self.stage_failed(PipelineStage::SelectClusters, &e)),
        };

        let selection = match self
            .select_clusters(user_id, embedding.as_ref(), &profile, options, now)
            .await
        {
            Ok(s) => s,
            Err(e) => return Ok(self.stage_failed(PipelineStage::SelectClusters, &e)),
        };
        let scored_clusters = match selection {
            ClusterSelection::Clusters(c) => c,
            ClusterSelection::ColdStart => {
                return Ok(self.cold_start_or_empty(options, now).await);
            }
        };

        let cluster_scores: Vec<_> = scored_clusters
            .iter()
            .map(|(m, score)| (m.cluster.clone(), *score))
            .collect();
        let candidates = match self
            .selector
            .select(&cluster_scores, &options.exclude_ids, options.limit, now)
            .await
        {
            Ok(c) => c,
            Err(e) => return Ok(self.stage_failed(PipelineStage::SelectCandidates, &e)),
        };
        if candidates.is_empty() {
            debug!("Matched clusters produced no candidates");
            return Ok(self.cold_start_or_empty(options, now).await);
        }

        let user_vector = embedding.as_ref().map(|e| e.values());
        let ranked = match self
            .candidate_ranker
            .rank(&candidates, user_vector, options, now)
        {
            Ok(r) => r,
            Err(e) => {
                warn!(stage = %PipelineStage::Rank, error = %e, "Ranking degraded to neutral scores");
                CandidateRanker::neutral(&candidates, options.limit)
            }
        };

        let names: HashMap<&str, &str> = scored_clusters
            .iter()
            .map(|(m, _)| (m.cluster.id.as_str(), m.cluster.name.as_str()))
            .collect();
        let recommendations: Vec<Recommendation> = ranked
            .iter()
            .map(|r| to_recommendation(r, names.get(r.cluster_id.as_str()).copied(), now))
            .collect();
        info!(
            stage = %PipelineStage::Return,
            count = recommendations.len(),
            "Recommendations ready"
        );
        Ok(recommendations)
    }

    fn stage_failed(&self, stage: PipelineStage, err: &EngineError) -> Vec<Recommendation> {
        error!(%stage, error = %err, "Recommendation pipeline failed");
        Vec::new()
    }

    async fn profile_or_default(&self, user_id: &str) -> Result<UserProfile, EngineError> {
        Ok(self
            .profiles
            .find_profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id)))
    }

    /// Current user embedding, rebuilt when missing or stale.
    ///
    /// Returns `None` for users without any signal to build from.
    pub async fn ensure_user_embedding(
        &self,
        user_id: &str,
    ) -> Result<Option<Embedding>, EngineError> {
        let existing = self.embeddings.find(EntityKind::User, user_id).await?;
        if let Some(e) = &existing {
            if self.embeddings.is_recent(EntityKind::User, e.updated_at()) {
                return Ok(existing);
            }
        }
        match self.rebuild_user_embedding(user_id, existing.as_ref()).await? {
            Some(rebuilt) => Ok(Some(rebuilt)),
            None => Ok(existing),
        }
    }

    /// Recomputes and stores the user embedding regardless of freshness.
    ///
    /// Returns `None` without writing when the user has no signal.
    pub async fn refresh_user_embedding(
        &self,
        user_id: &str,
    ) -> Result<Option<Embedding>, EngineError> {
        let existing = self.embeddings.find(EntityKind::User, user_id).await?;
        self.rebuild_user_embedding(user_id, existing.as_ref()).await
    }

    async fn rebuild_user_embedding(
        &self,
        user_id: &str,
        existing: Option<&Embedding>,
    ) -> Result<Option<Embedding>, EngineError> {
        let profile = self.profile_or_default(user_id).await?;
        let history = self
            .interactions
            .find_by_user(user_id, self.config.embedding.user_history_limit, 0)
            .await?;
        let signals = UserSignals::from_profile(&profile, history);
        if !self.user_builder.validate(&signals) {
            return Ok(None);
        }

        let vector = match existing {
            Some(current) if current.vector.dimension == self.config.embedding.dimension => {
                self.user_builder.update(&current.vector, &signals)?
            }
            _ => self.user_builder.build(&signals)?,
        };
        let metadata = self.user_builder.metadata(&signals);
        let stored = self
            .embeddings
            .upsert(EntityKind::User, user_id, vector, metadata)
            .await?;
        Ok(Some(stored))
    }

    async fn select_clusters(
        &self,
        user_id: &str,
        embedding: Option<&Embedding>,
        profile: &UserProfile,
        options: &RecommendationOptions,
        now: DateTime<Utc>,
    ) -> Result<ClusterSelection, EngineError> {
        let user_vector = embedding.map(|e| e.values()).filter(|v| !crate::vector::is_zero(v));
        let Some(user_vector) = user_vector else {
            debug!("No embedding signal, using cold start");
            return Ok(ClusterSelection::ColdStart);
        };

        let clusters = self.clusters.list().await?;
        let ranks = self.clusters.user_ranks(user_id).await?;
        let matches = self.matcher.find_matching_clusters(
            Some(user_vector),
            profile,
            &ranks,
            &clusters,
            options.context.as_ref(),
        );
        if matches.is_empty() {
            debug!("No matching clusters, using cold start");
            return Ok(ClusterSelection::ColdStart);
        }

        let interactions = self
            .interactions
            .find_by_user(user_id, self.config.ranking.max_interactions, 0)
            .await?;
        let interaction_count = self.interactions.count_by_user(user_id).await?;
        let by_id: HashMap<&str, &crate::types::ClusterInfo> =
            clusters.iter().map(|c| (c.id.as_str(), c)).collect();
        let recent_clusters = profile
            .recent_cluster_ids
            .iter()
            .take(self.config.ranking.recent_cluster_window)
            .filter_map(|id| by_id.get(id.as_str()).map(|c| (*c).clone()))
            .collect();

        let input = UserRankingInput {
            embedding: Some(user_vector.to_vec()),
            profile: profile.clone(),
            interactions,
            interaction_count,
            recent_clusters,
            context: options.context.clone(),
            now,
        };
        let matched: Vec<_> = matches.iter().map(|m| m.cluster.clone()).collect();
        let ranking = self.cluster_ranker.rank_clusters(&matched, &input);

        let mut by_cluster: HashMap<String, ClusterMatch> = matches
            .into_iter()
            .map(|m| (m.cluster.id.clone(), m))
            .collect();
        let scored = ranking
            .into_iter()
            .filter_map(|r| by_cluster.remove(&r.cluster_id).map(|m| (m, r.score)))
            .collect();
        Ok(ClusterSelection::Clusters(scored))
    }

    async fn cold_start_or_empty(
        &self,
        options: &RecommendationOptions,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        match self.cold_start(options, now).await {
            Ok(r) => r,
            Err(e) => self.stage_failed(PipelineStage::SelectCandidates, &e),
        }
    }

    /// Recent content ranked by engagement rate and freshness.
    ///
    /// Draws from posts of the last `cold_start_window_hours`; when fewer
    /// than `cold_start_min_recent` qualify, any of the `cold_start_pool`
    /// newest posts are used instead.
    pub async fn cold_start(
        &self,
        options: &RecommendationOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<Recommendation>, EngineError> {
        let rc = &self.config.recommendation;
        let mut pool: Vec<ContentItem> = Vec::new();
        for id in self.content.find_recent_ids(rc.cold_start_pool).await? {
            if options.exclude_ids.contains(&id) {
                continue;
            }
            if let Some(item) = self.content.find_by_id(&id).await? {
                pool.push(item);
            }
        }

        let window = Duration::hours(rc.cold_start_window_hours);
        let recent: Vec<ContentItem> = pool
            .iter()
            .filter(|item| now - item.created_at <= window)
            .cloned()
            .collect();
        if recent.len() >= rc.cold_start_min_recent {
            pool = recent;
        }

        let freshness_hours = rc.cold_start_window_hours.max(1) as f32;
        let mut scored: Vec<(f32, ContentItem)> = pool
            .into_iter()
            .map(|item| {
                let quality = item.engagement.engagement_rate().clamp(0.0, 1.0);
                let age_hours = (now - item.created_at).num_seconds().max(0) as f32 / 3600.0;
                let novelty = (-age_hours / freshness_hours).exp();
                (0.6 * quality + 0.4 * novelty, item)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored.truncate(options.limit);

        debug!(count = scored.len(), "Cold start recommendations");
        Ok(scored
            .into_iter()
            .map(|(score, item)| Recommendation {
                entity_id: item.id,
                entity_type: EntityKind::Post,
                score,
                timestamp: now,
                source: RecommendationSource::ColdStart,
                reasons: vec!["popular_recently".to_string()],
            })
            .collect())
    }

    // =========================================================================
    // Interactions and new content
    // =========================================================================

    /// Logs an interaction and updates derived state.
    ///
    /// The append is the only step whose failure is returned; once it
    /// succeeded, the user-embedding recompute (for significant types) and
    /// the user-cluster rank updates are best effort and only logged.
    #[instrument(skip_all, fields(user_id = %user_id, entity_id = %entity_id, kind = %interaction_type))]
    pub async fn process_interaction(
        &self,
        user_id: &str,
        entity_id: &str,
        entity_type: EntityKind,
        interaction_type: InteractionType,
        metadata: Metadata,
    ) -> Result<UserInteraction, EngineError> {
        let event = InteractionEvent::new(user_id, entity_id, entity_type, interaction_type)
            .with_metadata(metadata);
        let logged = self.interactions.append(event).await?;

        if self
            .config
            .recommendation
            .significant_interactions
            .contains(&interaction_type)
        {
            if let Err(e) = self.refresh_user_embedding(user_id).await {
                warn!(error = %e, "User embedding recompute failed");
            }
        }

        if entity_type == EntityKind::Post {
            match self.clusters.clusters_containing(entity_id).await {
                Ok(clusters) => {
                    for cluster in clusters {
                        if let Err(e) = self
                            .clusters
                            .record_interaction(user_id, &cluster.id, interaction_type)
                            .await
                        {
                            warn!(cluster_id = %cluster.id, error = %e, "Rank update failed");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Cluster lookup failed"),
            }
        }

        Ok(logged)
    }

    /// Embeds a new post and attaches it to similar clusters.
    ///
    /// Returns the ids of the clusters it joined.
    #[instrument(skip_all, fields(post_id = %post_id))]
    pub async fn process_new_post(&self, post_id: &str) -> Result<Vec<String>, EngineError> {
        let item = self
            .content
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("post {}", post_id)))?;
        let embedding = self.embed_post(&item).await?;
        self.clusters
            .assign_item_to_clusters(post_id, embedding.values())
            .await
    }

    /// Builds and stores the embedding of a post.
    pub async fn embed_post(&self, item: &ContentItem) -> Result<Embedding, EngineError> {
        let vector = self.post_builder.build(item)?;
        let metadata = self.post_builder.metadata(item);
        self.embeddings
            .upsert(EntityKind::Post, &item.id, vector, metadata)
            .await
    }
}

fn to_recommendation(
    ranked: &RankedCandidate,
    cluster_name: Option<&str>,
    now: DateTime<Utc>,
) -> Recommendation {
    let mut reasons = Vec::new();
    if let Some(name) = cluster_name {
        reasons.push(format!("cluster:{}", name));
    }
    if ranked.factors.relevance >= 0.75 {
        reasons.push("similar_to_your_taste".to_string());
    }
    if ranked.factors.engagement >= 0.7 {
        reasons.push("popular".to_string());
    }
    if ranked.factors.novelty >= 0.8 {
        reasons.push("fresh".to_string());
    }
    Recommendation {
        entity_id: ranked.id.clone(),
        entity_type: EntityKind::Post,
        score: ranked.score,
        timestamp: now,
        source: RecommendationSource::Clusters,
        reasons,
    }
}
