//! Cluster maintenance between clustering runs.

use super::is_outlier_cluster;
use crate::config::{ClusteringConfig, INITIAL_RANK_SCORE};
use crate::error::EngineError;
use crate::interaction::InteractionLog;
use crate::storage::ClusterRepository;
use crate::types::{ClusterInfo, InteractionType, UserClusterRank, UserInteraction};
use crate::vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Member overlap (Jaccard) above which a new cluster inherits the id of a
/// previous one.
const ID_CARRY_OVERLAP: f32 = 0.5;

/// Stability recorded when there is no previous run to compare against.
const FIRST_RUN_STABILITY: f32 = 0.5;

/// Aggregate engagement with a cluster's members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterEngagementStats {
    pub cluster_id: String,
    pub total_interactions: usize,
    pub interactions_by_type: BTreeMap<InteractionType, usize>,
    /// Interactions per member.
    pub engagement_rate: f32,
    /// Share of engaged users with more than one interaction.
    pub retention_rate: f32,
    pub unique_users: usize,
}

impl ClusterEngagementStats {
    /// Computes the stats from any interaction set; events outside the
    /// cluster are ignored.
    pub fn compute(cluster: &ClusterInfo, interactions: &[UserInteraction]) -> Self {
        let mut stats = Self {
            cluster_id: cluster.id.clone(),
            ..Default::default()
        };
        if cluster.member_ids.is_empty() {
            return stats;
        }

        let members: HashSet<&str> = cluster.member_ids.iter().map(String::as_str).collect();
        let mut per_user: HashMap<&str, usize> = HashMap::new();
        for event in interactions
            .iter()
            .filter(|e| members.contains(e.entity_id.as_str()))
        {
            stats.total_interactions += 1;
            *stats
                .interactions_by_type
                .entry(event.interaction_type)
                .or_default() += 1;
            *per_user.entry(event.user_id.as_str()).or_default() += 1;
        }

        stats.unique_users = per_user.len();
        stats.engagement_rate = stats.total_interactions as f32 / cluster.member_ids.len() as f32;
        if stats.unique_users > 0 {
            let returning = per_user.values().filter(|c| **c > 1).count();
            stats.retention_rate = returning as f32 / stats.unique_users as f32;
        }
        stats
    }
}

/// Cluster and user-cluster rank maintenance.
pub struct ClusterStore {
    repo: Arc<dyn ClusterRepository>,
    config: ClusteringConfig,
}

impl ClusterStore {
    pub fn new(repo: Arc<dyn ClusterRepository>, config: ClusteringConfig) -> Self {
        Self { repo, config }
    }

    pub async fn list(&self) -> Result<Vec<ClusterInfo>, EngineError> {
        Ok(self.repo.list_clusters().await?)
    }

    pub async fn get(&self, cluster_id: &str) -> Result<ClusterInfo, EngineError> {
        self.repo
            .get_cluster(cluster_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("cluster {}", cluster_id)))
    }

    /// Clusters that list `item_id` as a member.
    pub async fn clusters_containing(&self, item_id: &str) -> Result<Vec<ClusterInfo>, EngineError> {
        Ok(self
            .repo
            .list_clusters()
            .await?
            .into_iter()
            .filter(|c| c.contains(item_id))
            .collect())
    }

    /// Adds a new post to every cluster whose centroid it is similar enough
    /// to. Returns the ids of the clusters it joined.
    ///
    /// Membership is idempotent; the outlier pseudo-cluster never takes new
    /// members.
    #[instrument(skip_all, fields(item_id = %item_id))]
    pub async fn assign_item_to_clusters(
        &self,
        item_id: &str,
        embedding: &[f32],
    ) -> Result<Vec<String>, EngineError> {
        let mut joined = Vec::new();
        for mut cluster in self.repo.list_clusters().await? {
            if is_outlier_cluster(&cluster) {
                continue;
            }
            let similarity = match vector::cosine_similarity(embedding, cluster.centroid.as_slice()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(cluster_id = %cluster.id, error = %e, "Skipping cluster");
                    continue;
                }
            };
            if similarity > self.config.assign_threshold {
                if cluster.add_member(item_id) {
                    self.repo.put_cluster(&cluster).await?;
                }
                joined.push(cluster.id);
            }
        }
        debug!(joined = joined.len(), "Assigned item to clusters");
        Ok(joined)
    }

    /// Applies an interaction boost to a user's rank row for a cluster,
    /// creating the row on first contact.
    pub async fn upsert_user_cluster_rank(
        &self,
        user_id: &str,
        cluster_id: &str,
        interaction_boost: f32,
    ) -> Result<UserClusterRank, EngineError> {
        let now = Utc::now();
        let rank = match self.repo.get_user_rank(user_id, cluster_id).await? {
            Some(mut rank) => {
                rank.interaction_score = (rank.interaction_score
                    + interaction_boost * self.config.rank_boost_factor)
                    .clamp(0.0, 1.0);
                rank.score = (rank.interaction_score + rank.match_score) / 2.0;
                rank.is_active = true;
                rank.last_interaction_date = now;
                rank
            }
            None => {
                let initial = if interaction_boost > 0.0 {
                    INITIAL_RANK_SCORE
                } else {
                    0.0
                };
                UserClusterRank {
                    user_id: user_id.to_string(),
                    cluster_id: cluster_id.to_string(),
                    score: initial,
                    similarity: INITIAL_RANK_SCORE,
                    interaction_score: initial,
                    match_score: INITIAL_RANK_SCORE,
                    is_active: true,
                    last_interaction_date: now,
                }
            }
        };
        self.repo.put_user_rank(&rank).await?;
        Ok(rank)
    }

    /// Rank row update for one interaction, using the type's boost.
    pub async fn record_interaction(
        &self,
        user_id: &str,
        cluster_id: &str,
        interaction_type: InteractionType,
    ) -> Result<UserClusterRank, EngineError> {
        self.upsert_user_cluster_rank(user_id, cluster_id, interaction_type.rank_boost())
            .await
    }

    pub async fn user_ranks(&self, user_id: &str) -> Result<Vec<UserClusterRank>, EngineError> {
        Ok(self.repo.user_ranks(user_id).await?)
    }

    pub async fn user_rank(
        &self,
        user_id: &str,
        cluster_id: &str,
    ) -> Result<Option<UserClusterRank>, EngineError> {
        Ok(self.repo.get_user_rank(user_id, cluster_id).await?)
    }

    /// Deactivates rank rows of `user_id` untouched since `older_than`.
    /// Returns how many rows changed.
    pub async fn mark_inactive(
        &self,
        user_id: &str,
        older_than: DateTime<Utc>,
    ) -> Result<usize, EngineError> {
        let mut changed = 0;
        for mut rank in self.repo.user_ranks(user_id).await? {
            if rank.is_active && rank.last_interaction_date < older_than {
                rank.is_active = false;
                self.repo.put_user_rank(&rank).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Replaces the whole cluster set with the output of a clustering run.
    ///
    /// Each new cluster is compared with the previous set: the best member
    /// overlap is stored as `stability` metadata, and a cluster overlapping a
    /// previous one by at least half keeps that cluster's id and creation time
    /// so existing rank rows stay attached. Returns the clusters as stored.
    #[instrument(skip_all, fields(clusters = clusters.len()))]
    pub async fn replace_all(
        &self,
        mut clusters: Vec<ClusterInfo>,
    ) -> Result<Vec<ClusterInfo>, EngineError> {
        let previous = self.repo.list_clusters().await?;
        let mut carried: HashSet<String> = HashSet::new();
        let mut unmatched: Vec<usize> = Vec::new();

        for (i, cluster) in clusters.iter_mut().enumerate() {
            if previous.is_empty() {
                set_stability(cluster, FIRST_RUN_STABILITY);
                continue;
            }
            let outlier = is_outlier_cluster(cluster);
            let best = previous
                .iter()
                .filter(|p| is_outlier_cluster(p) == outlier && !carried.contains(&p.id))
                .map(|p| (p, jaccard(&p.member_ids, &cluster.member_ids)))
                .max_by(|a, b| a.1.total_cmp(&b.1));

            match best {
                Some((prev, overlap)) => {
                    set_stability(cluster, overlap);
                    if overlap >= ID_CARRY_OVERLAP && !outlier {
                        cluster.id = prev.id.clone();
                        cluster.created_at = prev.created_at;
                        carried.insert(prev.id.clone());
                    } else {
                        unmatched.push(i);
                    }
                }
                None => {
                    set_stability(cluster, 0.0);
                    unmatched.push(i);
                }
            }
        }

        // An unmatched cluster must not reuse any previous id, or it would
        // inherit rank rows belonging to an unrelated cluster
        let previous_ids: HashSet<&str> = previous.iter().map(|p| p.id.as_str()).collect();
        let mut next = previous.len() + clusters.len();
        for i in unmatched {
            let id = clusters[i].id.as_str();
            if !previous_ids.contains(id) && !carried.contains(id) {
                continue;
            }
            let taken: HashSet<String> = clusters.iter().map(|c| c.id.clone()).collect();
            let mut candidate = format!("dbscan-{}", next);
            while taken.contains(&candidate) || previous_ids.contains(candidate.as_str()) {
                next += 1;
                candidate = format!("dbscan-{}", next);
            }
            next += 1;
            clusters[i].id = candidate;
        }

        self.repo.replace_clusters(&clusters).await?;
        info!(
            previous = previous.len(),
            current = clusters.len(),
            carried = carried.len(),
            "Replaced cluster set"
        );
        Ok(clusters)
    }

    /// Engagement metrics over the interactions with a cluster's members.
    pub async fn engagement_stats(
        &self,
        cluster_id: &str,
        interactions: &InteractionLog,
    ) -> Result<ClusterEngagementStats, EngineError> {
        let cluster = self.get(cluster_id).await?;
        let mut events = Vec::new();
        for member in &cluster.member_ids {
            events.extend(interactions.find_by_entity(member).await?);
        }
        Ok(ClusterEngagementStats::compute(&cluster, &events))
    }
}

fn set_stability(cluster: &mut ClusterInfo, stability: f32) {
    cluster
        .metadata
        .insert("stability".into(), Value::from(stability as f64));
}

fn jaccard(a: &[String], b: &[String]) -> f32 {
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::test_utils::{make_cluster, make_interaction, unit};
    use crate::types::InteractionEvent;
    use chrono::Duration;

    fn store() -> (ClusterStore, Arc<InMemoryStore>) {
        let repo = Arc::new(InMemoryStore::new());
        (
            ClusterStore::new(repo.clone(), ClusteringConfig::default()),
            repo,
        )
    }

    #[tokio::test]
    async fn test_assign_joins_similar_clusters_once() {
        let (store, repo) = store();
        repo.replace_clusters(&[
            make_cluster("c1", &[1.0, 0.0], &["a"], &["rust"]),
            make_cluster("c2", &[0.0, 1.0], &["b"], &["cooking"]),
        ])
        .await
        .unwrap();

        let joined = store
            .assign_item_to_clusters("p1", &unit(&[1.0, 0.1]))
            .await
            .unwrap();
        assert_eq!(joined, vec!["c1".to_string()]);

        // Idempotent
        store
            .assign_item_to_clusters("p1", &unit(&[1.0, 0.1]))
            .await
            .unwrap();
        let c1 = store.get("c1").await.unwrap();
        assert_eq!(c1.member_ids, vec!["a".to_string(), "p1".to_string()]);
        assert_eq!(c1.size, 2);
        assert!(!store.get("c2").await.unwrap().contains("p1"));
    }

    #[tokio::test]
    async fn test_assign_skips_outliers_and_bad_dimensions() {
        let (store, repo) = store();
        let mut outliers = make_cluster("outliers", &[1.0, 0.0], &["x"], &[]);
        outliers.metadata.insert("outliers".into(), Value::Bool(true));
        repo.replace_clusters(&[
            outliers,
            make_cluster("c3", &[1.0, 0.0, 0.0], &[], &[]),
        ])
        .await
        .unwrap();

        let joined = store
            .assign_item_to_clusters("p1", &[1.0, 0.0])
            .await
            .unwrap();
        assert!(joined.is_empty());
    }

    #[tokio::test]
    async fn test_rank_row_creation_and_boost() {
        let (store, _) = store();
        let created = store
            .upsert_user_cluster_rank("u1", "c1", 0.5)
            .await
            .unwrap();
        assert_eq!(created.score, 0.3);
        assert_eq!(created.interaction_score, 0.3);
        assert_eq!(created.match_score, 0.3);
        assert!(created.is_active);

        let boosted = store
            .upsert_user_cluster_rank("u1", "c1", 0.5)
            .await
            .unwrap();
        // 0.3 + 0.5 * 0.2
        assert!((boosted.interaction_score - 0.4).abs() < 1e-6);
        assert!((boosted.score - 0.35).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_negative_first_contact_starts_at_zero() {
        let (store, _) = store();
        let rank = store
            .record_interaction("u1", "c1", InteractionType::Dislike)
            .await
            .unwrap();
        assert_eq!(rank.score, 0.0);
        assert_eq!(rank.interaction_score, 0.0);
        assert_eq!(rank.match_score, 0.3);
    }

    #[tokio::test]
    async fn test_interaction_score_saturates() {
        let (store, _) = store();
        for _ in 0..20 {
            store
                .record_interaction("u1", "c1", InteractionType::Share)
                .await
                .unwrap();
        }
        let rank = store.user_rank("u1", "c1").await.unwrap().unwrap();
        assert_eq!(rank.interaction_score, 1.0);
    }

    #[tokio::test]
    async fn test_mark_inactive() {
        let (store, repo) = store();
        let mut stale = store.upsert_user_cluster_rank("u1", "c1", 1.0).await.unwrap();
        stale.last_interaction_date = Utc::now() - Duration::days(60);
        repo.put_user_rank(&stale).await.unwrap();
        store.upsert_user_cluster_rank("u1", "c2", 1.0).await.unwrap();

        let changed = store
            .mark_inactive("u1", Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(changed, 1);
        let c1 = store.user_rank("u1", "c1").await.unwrap().unwrap();
        assert!(!c1.is_active);
    }

    #[tokio::test]
    async fn test_replace_all_first_run_keeps_ids() {
        let (store, _) = store();
        let stored = store
            .replace_all(vec![
                make_cluster("dbscan-0", &[1.0, 0.0], &["a", "b"], &[]),
                make_cluster("dbscan-1", &[0.0, 1.0], &["c", "d"], &[]),
            ])
            .await
            .unwrap();
        assert_eq!(stored[0].id, "dbscan-0");
        assert_eq!(stored[0].metadata_f32("stability"), Some(0.5));
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_all_carries_ids_across_runs() {
        let (store, _) = store();
        store
            .replace_all(vec![
                make_cluster("dbscan-0", &[1.0, 0.0], &["a", "b", "c"], &[]),
                make_cluster("dbscan-1", &[0.0, 1.0], &["x", "y"], &[]),
            ])
            .await
            .unwrap();

        // Discovery order flipped: the a/b/c group is now found second
        let stored = store
            .replace_all(vec![
                make_cluster("dbscan-0", &[0.0, 1.0], &["q", "r"], &[]),
                make_cluster("dbscan-1", &[1.0, 0.0], &["a", "b", "c", "d"], &[]),
            ])
            .await
            .unwrap();

        let abc = stored.iter().find(|c| c.contains("a")).unwrap();
        assert_eq!(abc.id, "dbscan-0");
        assert!((abc.metadata_f32("stability").unwrap() - 0.75).abs() < 1e-6);

        let qr = stored.iter().find(|c| c.contains("q")).unwrap();
        assert_ne!(qr.id, "dbscan-0");
        assert_eq!(qr.metadata_f32("stability"), Some(0.0));

        let ids: HashSet<&str> = stored.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn test_replace_all_new_cluster_does_not_inherit_stale_id() {
        let (store, _) = store();
        store
            .replace_all(vec![
                make_cluster("dbscan-0", &[1.0, 0.0], &["a", "b"], &[]),
                make_cluster("dbscan-1", &[0.0, 1.0], &["x", "y"], &[]),
            ])
            .await
            .unwrap();
        store.upsert_user_cluster_rank("u1", "dbscan-1", 1.0).await.unwrap();

        let stored = store
            .replace_all(vec![
                make_cluster("dbscan-0", &[1.0, 0.0], &["a", "b"], &[]),
                make_cluster("dbscan-1", &[0.0, 1.0], &["q", "r"], &[]),
            ])
            .await
            .unwrap();

        let tech = stored.iter().find(|c| c.contains("a")).unwrap();
        assert_eq!(tech.id, "dbscan-0");

        let fresh = stored.iter().find(|c| c.contains("q")).unwrap();
        assert_ne!(fresh.id, "dbscan-0");
        assert_ne!(fresh.id, "dbscan-1");
        assert_eq!(fresh.metadata_f32("stability"), Some(0.0));
        assert!(store.user_rank("u1", &fresh.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_engagement_stats() {
        let (store, repo) = store();
        repo.replace_clusters(&[make_cluster("c1", &[1.0, 0.0], &["p1", "p2"], &[])])
            .await
            .unwrap();
        let log = InteractionLog::new(repo.clone());
        for (user, entity, kind) in [
            ("u1", "p1", InteractionType::Like),
            ("u1", "p2", InteractionType::LongView),
            ("u2", "p1", InteractionType::Like),
            ("u3", "elsewhere", InteractionType::Like),
        ] {
            log.append(InteractionEvent::new(user, entity, crate::types::EntityKind::Post, kind))
                .await
                .unwrap();
        }

        let stats = store.engagement_stats("c1", &log).await.unwrap();
        assert_eq!(stats.total_interactions, 3);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.interactions_by_type[&InteractionType::Like], 2);
        assert!((stats.engagement_rate - 1.5).abs() < 1e-6);
        assert!((stats.retention_rate - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_engagement_stats_empty_cluster() {
        let cluster = make_cluster("c1", &[1.0], &[], &[]);
        let stats = ClusterEngagementStats::compute(
            &cluster,
            &[make_interaction("u1", "p1", InteractionType::Like, 1)],
        );
        assert_eq!(stats.total_interactions, 0);
        assert_eq!(stats.engagement_rate, 0.0);
    }
}
