//! Multi-factor ranking.
//!
//! Two levels:
//!
//! - [`ClusterRanker`] orders clusters for a user with six component scores
//!   (affinity, engagement, novelty, diversity, temporal, quality)
//! - [`CandidateRanker`] orders the posts selected from those clusters with
//!   five factors (relevance, engagement, novelty, diversity, context)
//!
//! Weights are tunable through [`crate::config`] and are always clamped and
//! renormalized to sum to 1 before use.

mod candidate;
mod cluster;
pub mod temporal;
mod weights;

pub use candidate::{diversify, Candidate, CandidateFactors, CandidateRanker, RankedCandidate};
pub use cluster::{
    ClusterRanker, ClusterRankingResult, ComponentScores, UserRankingInput, NEUTRAL_SCORE,
};
pub use weights::{adjust_candidate_weights, adjust_cluster_weights, normalize_weights, UserActivity};
