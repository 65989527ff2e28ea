//! Numeric helpers shared by every other module.
//!
//! All functions are pure. Functions that compare two vectors validate that
//! their dimensions agree and return [`VectorError::DimensionMismatch`]
//! otherwise.

use crate::error::VectorError;
use serde::{Deserialize, Serialize};

/// Distance function used for clustering and similarity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    /// `1 - cosine_similarity`, in [0, 2]
    #[default]
    Cosine,
    Euclidean,
    Manhattan,
}

/// Returns an error unless `a` and `b` have the same length.
pub fn check_dimensions(a: &[f32], b: &[f32]) -> Result<(), VectorError> {
    if a.len() != b.len() {
        return Err(VectorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Dot product. Extra trailing elements of the longer slice are ignored.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Returns `v` scaled to unit length.
///
/// The zero vector (and anything with a non-finite norm) is returned
/// unchanged; it stands for "no signal".
pub fn normalize_l2(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

/// In-place variant of [`normalize_l2`].
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// True when every element is zero.
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// Cosine similarity clamped to [-1, 1]. Zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, VectorError> {
    check_dimensions(a, b)?;
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return Ok(0.0);
    }
    Ok((dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

/// Distance between `a` and `b` under `kind`.
pub fn distance(a: &[f32], b: &[f32], kind: DistanceKind) -> Result<f32, VectorError> {
    check_dimensions(a, b)?;
    let d = match kind {
        DistanceKind::Cosine => 1.0 - cosine_similarity(a, b)?,
        DistanceKind::Euclidean => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
        DistanceKind::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
    };
    Ok(d)
}

/// Truncates or zero-pads `v` to `target_dim`.
pub fn resize(v: &[f32], target_dim: usize) -> Vec<f32> {
    let mut out = vec![0.0; target_dim];
    let n = v.len().min(target_dim);
    out[..n].copy_from_slice(&v[..n]);
    out
}

/// Weighted element-wise sum of equally sized vectors.
///
/// The result is not normalized; callers that need a unit vector normalize
/// afterwards.
pub fn combine<V: AsRef<[f32]>>(vectors: &[V], weights: &[f32]) -> Result<Vec<f32>, VectorError> {
    if vectors.len() != weights.len() {
        return Err(VectorError::InvalidInput(format!(
            "{} vectors but {} weights",
            vectors.len(),
            weights.len()
        )));
    }
    let first = vectors
        .first()
        .ok_or_else(|| VectorError::InvalidInput("no vectors to combine".to_string()))?
        .as_ref();

    let mut out = vec![0.0f32; first.len()];
    for (v, &w) in vectors.iter().zip(weights) {
        let v = v.as_ref();
        check_dimensions(first, v)?;
        for (acc, x) in out.iter_mut().zip(v) {
            *acc += x * w;
        }
    }
    Ok(out)
}

/// Element-wise mean of equally sized vectors.
pub fn mean<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Vec<f32>, VectorError> {
    let weight = 1.0 / vectors.len().max(1) as f32;
    combine(vectors, &vec![weight; vectors.len()])
}
