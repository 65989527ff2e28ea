//! Candidate selection from matched clusters.

use crate::config::SelectorConfig;
use crate::error::EngineError;
use crate::ranking::Candidate;
use crate::storage::{ContentRepository, EmbeddingRepository};
use crate::types::{ClusterInfo, EntityKind};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Pulls candidate posts out of scored clusters.
///
/// Clusters below the minimum score are skipped. Members are kept when they
/// exist in the content repository, are younger than the time window and
/// are not excluded; a post reachable from several clusters is taken once,
/// from the best-scoring cluster. Survivors are ordered by a blend of
/// cluster score, recency, engagement and a small random exploration term,
/// and `limit + buffer_size` of them are returned.
pub struct CandidateSelector {
    content: Arc<dyn ContentRepository>,
    embeddings: Arc<dyn EmbeddingRepository>,
    config: SelectorConfig,
    rng: Mutex<StdRng>,
}

impl CandidateSelector {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        embeddings: Arc<dyn EmbeddingRepository>,
        config: SelectorConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            content,
            embeddings,
            config,
            rng: Mutex::new(rng),
        }
    }

    #[instrument(skip_all, fields(clusters = clusters.len(), limit = limit))]
    pub async fn select(
        &self,
        clusters: &[(ClusterInfo, f32)],
        exclude_ids: &HashSet<String>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candidate>, EngineError> {
        let wanted = limit + self.config.buffer_size;
        let window = Duration::hours(self.config.time_window_hours);

        let mut ordered: Vec<&(ClusterInfo, f32)> = clusters
            .iter()
            .filter(|(_, score)| *score >= self.config.min_cluster_score)
            .collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut seen: HashSet<String> = HashSet::new();
        let mut scored: Vec<(f32, Candidate)> = Vec::new();

        for (cluster, cluster_score) in ordered {
            let mut taken = 0;
            for member in &cluster.member_ids {
                if taken >= wanted {
                    break;
                }
                if exclude_ids.contains(member) || seen.contains(member) {
                    continue;
                }
                let Some(item) = self.content.find_by_id(member).await? else {
                    continue;
                };
                if now - item.created_at > window {
                    continue;
                }
                seen.insert(member.clone());
                taken += 1;

                let embedding = self
                    .embeddings
                    .get_embedding(EntityKind::Post, member)
                    .await?
                    .map(|e| e.vector.values);
                let score = self.selection_score(
                    *cluster_score,
                    &item.created_at,
                    item.engagement.engagement_rate(),
                    now,
                );
                scored.push((
                    score,
                    Candidate {
                        item,
                        cluster_id: cluster.id.clone(),
                        cluster_score: *cluster_score,
                        embedding,
                    },
                ));
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(wanted);
        debug!(selected = scored.len(), "Selected candidates");
        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    fn selection_score(
        &self,
        cluster_score: f32,
        created_at: &DateTime<Utc>,
        engagement_rate: f32,
        now: DateTime<Utc>,
    ) -> f32 {
        let window_hours = self.config.time_window_hours.max(1) as f32;
        let age_hours = (now - *created_at).num_seconds().max(0) as f32 / 3600.0;
        let recency = (1.0 - age_hours / window_hours).clamp(0.0, 1.0);
        let exploration = match self.rng.lock() {
            Ok(mut rng) => rng.gen::<f32>(),
            Err(_) => 0.0,
        };

        cluster_score.clamp(0.0, 1.0) * self.config.cluster_score_weight
            + recency * self.config.recency_weight
            + engagement_rate.clamp(0.0, 1.0) * self.config.engagement_weight
            + exploration * self.config.exploration_weight
    }
}
