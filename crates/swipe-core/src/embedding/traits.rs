//! The builder contract shared by user and post embeddings.

use crate::error::EngineError;
use crate::types::{EmbeddingVector, Metadata};
use crate::vector;
use chrono::Utc;

/// Turns raw entity signals into a fixed-dimension, L2-normalized vector.
pub trait EmbeddingBuilder: Send + Sync {
    /// Raw signals consumed by this builder.
    type Input;

    /// True when `input` carries enough signal to build a vector.
    fn validate(&self, input: &Self::Input) -> bool;

    /// Builds a vector from scratch.
    fn build(&self, input: &Self::Input) -> Result<EmbeddingVector, EngineError>;

    /// `(current, new)` shares used by [`update`](Self::update).
    fn blend_ratios(&self) -> (f32, f32);

    /// Descriptive metadata stored next to the vector.
    fn metadata(&self, _input: &Self::Input) -> Metadata {
        Metadata::new()
    }

    /// Moves `current` toward a vector built from `input`.
    ///
    /// This is an exponential moving average, not a recompute: the result is
    /// `normalize(current_share * current + new_share * build(input))`.
    fn update(
        &self,
        current: &EmbeddingVector,
        input: &Self::Input,
    ) -> Result<EmbeddingVector, EngineError> {
        let fresh = self.build(input)?;
        let (current_share, new_share) = self.blend_ratios();
        blend(current, &fresh, current_share, new_share)
    }
}

/// Weighted blend of two vectors, renormalized. Keeps `current.created_at`.
pub fn blend(
    current: &EmbeddingVector,
    fresh: &EmbeddingVector,
    current_share: f32,
    new_share: f32,
) -> Result<EmbeddingVector, EngineError> {
    let mut values = vector::combine(
        &[current.as_slice(), fresh.as_slice()],
        &[current_share, new_share],
    )?;
    vector::normalize_in_place(&mut values);
    Ok(EmbeddingVector {
        dimension: values.len(),
        values,
        created_at: current.created_at,
        updated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_moves_toward_new_vector() {
        let current = EmbeddingVector::new(vec![1.0, 0.0]);
        let fresh = EmbeddingVector::new(vec![0.0, 1.0]);
        let blended = blend(&current, &fresh, 0.7, 0.3).unwrap();

        assert!(blended.values[0] > blended.values[1]);
        assert!(blended.values[1] > 0.0);
        assert!((vector::l2_norm(&blended.values) - 1.0).abs() < 1e-5);
        assert_eq!(blended.created_at, current.created_at);
    }

    #[test]
    fn test_blend_rejects_mismatched_dimensions() {
        let current = EmbeddingVector::new(vec![1.0, 0.0]);
        let fresh = EmbeddingVector::new(vec![1.0]);
        assert!(blend(&current, &fresh, 0.7, 0.3).is_err());
    }
}
