//! Recommendation pipeline.
//!
//! [`RecommendationCoordinator`] owns the engine components and runs a request
//! through them:
//!
//! ```text
//! ensure user embedding -> ClusterMatcher -> ClusterRanker
//!     -> CandidateSelector -> CandidateRanker -> Recommendation
//! ```
//!
//! Users with nothing to go on (no embedding signal, no matching clusters or
//! no candidates) are served recent popular content instead.

mod coordinator;
mod matcher;
mod selector;

pub use coordinator::{PipelineStage, RecommendationCoordinator, Repositories};
pub use matcher::{ClusterMatch, ClusterMatcher};
pub use selector::CandidateSelector;
