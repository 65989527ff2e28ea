//! # Swipe Core
//!
//! Recommendation engine for a short-form content feed: user and post
//! embeddings, density-based clustering of posts, and multi-factor ranking of
//! clusters and candidate posts.
//!
//! ## Modules
//!
//! - [`recommendation`] - Request pipeline and interaction handling
//! - [`ranking`] - Cluster and candidate scoring, weight adjustment
//! - [`clustering`] - DBSCAN, cluster maintenance and user-cluster ranks
//! - [`embedding`] - User/post embedding builders and versioned storage
//! - [`interaction`] - Append-only interaction log and decay
//! - [`batch`] - Periodic embedding refresh and re-clustering
//! - [`storage`] - Repository traits, in-memory and redb implementations
//! - [`vector`] - Vector math
//! - [`config`] - Default constants and the configuration tree
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use swipe_core::config::EngineConfig;
//! use swipe_core::embedding::HashingEmbeddingModel;
//! use swipe_core::recommendation::{RecommendationCoordinator, Repositories};
//! use swipe_core::storage::InMemoryStore;
//!
//! # async fn run() -> Result<(), swipe_core::error::EngineError> {
//! let store = Arc::new(InMemoryStore::new());
//! let engine = RecommendationCoordinator::new(
//!     Repositories::shared(store),
//!     Arc::new(HashingEmbeddingModel::default()),
//!     EngineConfig::default(),
//! )?;
//! let recs = engine
//!     .get_recommendations("user-1", &engine.default_options())
//!     .await?;
//! # let _ = recs;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod clustering;
pub mod config;
pub mod embedding;
pub mod error;
pub mod interaction;
pub mod ranking;
pub mod recommendation;
pub mod storage;
pub mod types;
pub mod vector;

#[cfg(test)]
mod test_utils;
