//! Error types for swipe-core.
//!
//! Vector math reports [`VectorError`]; everything above it (builders,
//! clustering, ranking, orchestration) reports [`EngineError`]. Storage
//! adapters report [`StoreError`](crate::storage::StoreError), which converts
//! into `EngineError` at the repository boundary.

use crate::storage::StoreError;
use thiserror::Error;

/// Errors raised by the pure vector utilities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    /// Two vectors that must share a dimension do not
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Arguments are malformed (empty input, weight count mismatch, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Errors surfaced by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Malformed or inconsistent arguments; never retried
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Vector dimensions disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Referenced entity does not exist (yet)
    #[error("Not found: {0}")]
    NotFound(String),
    /// A backing store could not be reached or failed mid-operation
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<VectorError> for EngineError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                EngineError::DimensionMismatch { expected, actual }
            }
            VectorError::InvalidInput(msg) => EngineError::InvalidInput(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => EngineError::NotFound(key),
            other => EngineError::StorageUnavailable(other.to_string()),
        }
    }
}

impl EngineError {
    /// True for errors that mean "no data yet" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: EngineError = StoreError::NotFound("user:42".to_string()).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_store_failures_map_to_unavailable() {
        let err: EngineError = StoreError::DatabaseError("disk full".to_string()).into();
        assert!(matches!(err, EngineError::StorageUnavailable(msg) if msg.contains("disk full")));
    }

    #[test]
    fn test_vector_mismatch_keeps_dimensions() {
        let err: EngineError = VectorError::DimensionMismatch {
            expected: 128,
            actual: 64,
        }
        .into();
        assert_eq!(
            err,
            EngineError::DimensionMismatch {
                expected: 128,
                actual: 64
            }
        );
    }
}
