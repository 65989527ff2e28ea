//! Periodic embedding refresh and re-clustering.

use super::progress::{BatchProgress, BatchRunReport, ProgressTimer};
use crate::clustering::{materialize, DbscanClustering};
use crate::config::BatchConfig;
use crate::error::EngineError;
use crate::recommendation::RecommendationCoordinator;
use crate::types::{ContentItem, EntityKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const SECONDS_PER_HOUR: u64 = 3600;

/// Reports of a forced update; `None` when that job was already running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForcedUpdate {
    pub embeddings: Option<BatchRunReport>,
    pub clustering: Option<BatchRunReport>,
}

/// Clears a job's running flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs the two maintenance jobs on independent timers.
///
/// - Embedding refresh re-embeds recent posts whose embedding is missing or
///   stale, then rebuilds stale user embeddings
/// - Re-clustering runs DBSCAN over all post embeddings and replaces the
///   cluster set
///
/// Each job is skipped while a previous run of it is still going. Items are
/// processed in batches of `batch_size`, at most `max_items_per_run` per run;
/// a failing item is counted and never aborts the run.
pub struct BatchProcessor {
    engine: Arc<RecommendationCoordinator>,
    config: BatchConfig,
    embeddings_running: AtomicBool,
    clustering_running: AtomicBool,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl BatchProcessor {
    pub fn new(engine: Arc<RecommendationCoordinator>) -> Self {
        let config = engine.config().batch.clone();
        let (shutdown, _) = watch::channel(false);
        Self {
            engine,
            config,
            embeddings_running: AtomicBool::new(false),
            clustering_running: AtomicBool::new(false),
            shutdown,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// True while the interval loops are scheduled.
    pub fn is_started(&self) -> bool {
        self.handles.lock().map(|h| !h.is_empty()).unwrap_or(false)
    }

    /// Spawns both interval loops on the current tokio runtime.
    ///
    /// The first tick of each loop fires immediately. Calling `start` on a
    /// started processor does nothing.
    pub fn start(self: &Arc<Self>) {
        let Ok(mut handles) = self.handles.lock() else {
            error!("Batch processor state poisoned, not starting");
            return;
        };
        if !handles.is_empty() {
            debug!("Batch processor already started");
            return;
        }
        self.shutdown.send_replace(false);

        let embeddings = Duration::from_secs(self.config.embedding_interval_hours * SECONDS_PER_HOUR);
        let clustering = Duration::from_secs(self.config.clustering_interval_hours * SECONDS_PER_HOUR);

        let this = Arc::clone(self);
        let mut stop = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(embeddings);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = this.run_embedding_refresh().await {
                            error!(error = %e, "Embedding refresh failed");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
        }));

        let this = Arc::clone(self);
        let mut stop = self.shutdown.subscribe();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(clustering);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = this.run_clustering().await {
                            error!(error = %e, "Re-clustering failed");
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
        }));

        info!(
            embedding_interval_hours = self.config.embedding_interval_hours,
            clustering_interval_hours = self.config.clustering_interval_hours,
            "Batch processor started"
        );
    }

    /// Signals both loops to stop and waits for them.
    ///
    /// A run in progress finishes before its loop exits.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let handles: Vec<JoinHandle<()>> = match self.handles.lock() {
            Ok(mut h) => h.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Batch loop ended abnormally");
            }
        }
        info!("Batch processor stopped");
    }

    /// Runs both jobs now, independent of the timers.
    pub async fn force_update(&self) -> Result<ForcedUpdate, EngineError> {
        Ok(ForcedUpdate {
            embeddings: self.run_embedding_refresh().await?,
            clustering: self.run_clustering().await?,
        })
    }

    // =========================================================================
    // Embedding refresh
    // =========================================================================

    /// One embedding refresh run; `None` when a run is already in progress.
    pub async fn run_embedding_refresh(&self) -> Result<Option<BatchRunReport>, EngineError> {
        let Some(_guard) = RunGuard::acquire(&self.embeddings_running) else {
            debug!("Embedding refresh already running, skipping");
            return Ok(None);
        };
        let timer = ProgressTimer::new();
        let max_items = self.config.max_items_per_run;

        let post_ids = self.engine.content().find_recent_ids(max_items).await?;
        let stale_users = self
            .engine
            .embeddings()
            .list_stale(EntityKind::User, max_items.saturating_sub(post_ids.len()))
            .await?;

        let mut progress = BatchProgress::new(post_ids.len() + stale_users.len());
        info!(
            posts = post_ids.len(),
            users = stale_users.len(),
            "Embedding refresh started"
        );

        for (batch_idx, batch) in post_ids.chunks(self.config.batch_size).enumerate() {
            for post_id in batch {
                self.refresh_post(post_id, &mut progress).await;
            }
            progress.elapsed_ms = timer.elapsed_ms();
            log_batch("posts", batch_idx, &progress);
        }

        let user_ids: Vec<&str> = stale_users.iter().map(|e| e.entity_id.as_str()).collect();
        for (batch_idx, batch) in user_ids.chunks(self.config.batch_size).enumerate() {
            for user_id in batch {
                match self.engine.refresh_user_embedding(user_id).await {
                    Ok(Some(_)) => progress.record_success(),
                    Ok(None) => progress.record_skip(),
                    Err(e) => {
                        warn!(user_id, error = %e, "User embedding refresh failed");
                        progress.record_failure();
                    }
                }
            }
            progress.elapsed_ms = timer.elapsed_ms();
            log_batch("users", batch_idx, &progress);
        }

        progress.elapsed_ms = timer.elapsed_ms();
        let report = progress.report();
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            elapsed_ms = report.elapsed_ms,
            "Embedding refresh finished"
        );
        Ok(Some(report))
    }

    async fn refresh_post(&self, post_id: &str, progress: &mut BatchProgress) {
        let embeddings = self.engine.embeddings();
        match embeddings.find(EntityKind::Post, post_id).await {
            Ok(Some(e)) if embeddings.is_recent(EntityKind::Post, e.updated_at()) => {
                progress.record_skip();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(post_id, error = %e, "Post embedding lookup failed");
                progress.record_failure();
                return;
            }
        }

        let item = match self.engine.content().find_by_id(post_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                progress.record_skip();
                return;
            }
            Err(e) => {
                warn!(post_id, error = %e, "Post lookup failed");
                progress.record_failure();
                return;
            }
        };
        match self.engine.embed_post(&item).await {
            Ok(_) => progress.record_success(),
            Err(e) => {
                warn!(post_id, error = %e, "Post embedding failed");
                progress.record_failure();
            }
        }
    }

    // =========================================================================
    // Re-clustering
    // =========================================================================

    /// One re-clustering run; `None` when a run is already in progress.
    ///
    /// Clusters the `max_items_per_run` most recently embedded posts.
    /// Members of dense clusters count as succeeded and noise points as
    /// skipped. Posts whose content lookup failed still get clustered, without
    /// tags or author, and are counted as failed. Embeddings of the wrong
    /// dimension or with non-finite values are left out and counted as failed.
    pub async fn run_clustering(&self) -> Result<Option<BatchRunReport>, EngineError> {
        let Some(_guard) = RunGuard::acquire(&self.clustering_running) else {
            debug!("Re-clustering already running, skipping");
            return Ok(None);
        };
        let timer = ProgressTimer::new();

        let mut embeddings = self.engine.embeddings().all(EntityKind::Post).await?;
        embeddings.sort_by(|a, b| b.updated_at().cmp(&a.updated_at()));
        embeddings.truncate(self.config.max_items_per_run);
        let considered = embeddings.len();

        let dimension = self.engine.config().embedding.dimension;
        let mut ids = Vec::with_capacity(considered);
        let mut vectors = Vec::with_capacity(considered);
        let mut rejected = 0;
        for embedding in embeddings {
            if !is_clusterable(&embedding.vector.values, embedding.vector.dimension, dimension) {
                warn!(
                    post_id = %embedding.entity_id,
                    dimension = embedding.vector.dimension,
                    expected = dimension,
                    "Skipping unusable post embedding"
                );
                rejected += 1;
                continue;
            }
            ids.push(embedding.entity_id);
            vectors.push(embedding.vector.values);
        }
        let mut progress = BatchProgress::new(considered);
        info!(points = ids.len(), rejected, "Re-clustering started");

        let mut posts: HashMap<String, ContentItem> = HashMap::new();
        let mut lookup_failures = 0;
        for (batch_idx, batch) in ids.chunks(self.config.batch_size).enumerate() {
            for id in batch {
                match self.engine.content().find_by_id(id).await {
                    Ok(Some(item)) => {
                        posts.insert(id.clone(), item);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(post_id = %id, error = %e, "Post lookup failed");
                        lookup_failures += 1;
                    }
                }
            }
            debug!(batch = batch_idx, loaded = posts.len(), "Loaded cluster members");
        }

        let engine = DbscanClustering::new(self.engine.config().clustering.clone());
        let result = engine.cluster(&ids, &vectors)?;
        let clusters = materialize(&result, &posts, engine.config().max_topics);
        let stored = self.engine.clusters().replace_all(clusters).await?;

        let clustered: usize = result.dense_clusters().map(|c| c.size()).sum();
        progress.succeeded = clustered;
        progress.failed = lookup_failures + rejected;
        progress.skipped = result.noise_ids.len();
        progress.items_completed = considered;
        progress.elapsed_ms = timer.elapsed_ms();

        let report = progress.report();
        info!(
            clusters = stored.len(),
            noise = report.skipped,
            elapsed_ms = report.elapsed_ms,
            "Re-clustering finished"
        );
        Ok(Some(report))
    }
}

fn is_clusterable(values: &[f32], dimension: usize, expected: usize) -> bool {
    dimension == expected && values.len() == expected && values.iter().all(|v| v.is_finite())
}

fn log_batch(stage: &str, batch_idx: usize, progress: &BatchProgress) {
    info!(
        stage,
        batch = batch_idx,
        completed = progress.items_completed,
        total = progress.items_total,
        percent = progress.percent_complete(),
        eta_ms = progress.estimated_remaining_ms(),
        "Batch complete"
    );
}
