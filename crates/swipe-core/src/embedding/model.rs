//! Text embedding models.
//!
//! The engine only depends on the [`EmbeddingModel`] trait. The bundled
//! [`HashingEmbeddingModel`] needs no weights or network access, which makes it
//! suitable for tests and small deployments; a trained model can be plugged in
//! behind the same trait.

use crate::error::EngineError;
use crate::vector;
use std::collections::HashMap;

/// Anything that turns text into a fixed-dimension vector.
///
/// Implementations must be `Send + Sync`; one model instance is shared by
/// request handlers and the batch scheduler.
pub trait EmbeddingModel: Send + Sync {
    /// Length of every vector returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;

    /// Embeds `text`. Empty text yields the zero vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError>;
}

/// Feature-hashing text model.
///
/// Tokens are lowercased alphanumeric runs of at least two characters. Each
/// term is hashed (FNV-1a) into three signed positions weighted by term
/// frequency; adjacent token pairs add a smaller bigram signal. The result is
/// L2-normalized, so texts sharing vocabulary have high cosine similarity.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingModel {
    dimension: usize,
}

impl HashingEmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 2)
            .map(str::to_string)
            .collect()
    }

    fn sign(term: &str, seed: u64) -> f32 {
        if fnv1a(term, seed) % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }

    fn slot(&self, term: &str, seed: u64) -> usize {
        (fnv1a(term, seed) % self.dimension as u64) as usize
    }
}

impl Default for HashingEmbeddingModel {
    fn default() -> Self {
        Self::new(crate::config::EMBEDDING_DIM)
    }
}

impl EmbeddingModel for HashingEmbeddingModel {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        let tokens = Self::tokenize(text);
        let mut out = vec![0.0f32; self.dimension];
        if tokens.is_empty() {
            return Ok(out);
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for t in &tokens {
            *tf.entry(t.as_str()).or_default() += 1.0;
        }
        let total = tokens.len() as f32;

        for (term, count) in &tf {
            let weight = (count / total) * (1.0 + 1.0 / (term.len() as f32).sqrt());
            out[self.slot(term, 0)] += weight * Self::sign(term, 3);
            out[self.slot(term, 1)] += weight * Self::sign(term, 4) * 0.7;
            out[self.slot(term, 2)] += weight * Self::sign(term, 5) * 0.5;
        }

        for pair in tokens.windows(2) {
            let bigram = format!("{}_{}", pair[0], pair[1]);
            out[self.slot(&bigram, 6)] += 0.3 * Self::sign(&bigram, 7) / total;
        }

        vector::normalize_in_place(&mut out);
        Ok(out)
    }
}

/// Seeded FNV-1a.
fn fnv1a(term: &str, seed: u64) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325u64.wrapping_add(seed.wrapping_mul(0x5851_f42d_4c95_7f2d));
    for b in term.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0100_0000_01b3);
    }
    h
}

/// Hashes `key` into `[offset, offset + width)`; used to place categorical
/// values into fixed sub-vector ranges.
pub(crate) fn hashed_slot(key: &str, offset: usize, width: usize) -> usize {
    offset + (fnv1a(key, 11) % width.max(1) as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{cosine_similarity, l2_norm};

    #[test]
    fn test_embedding_is_normalized_and_sized() {
        let model = HashingEmbeddingModel::new(64);
        let v = model.embed("Rust makes systems programming fun").unwrap();
        assert_eq!(v.len(), 64);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let model = HashingEmbeddingModel::default();
        let v = model.embed("  !! ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let model = HashingEmbeddingModel::default();
        assert_eq!(
            model.embed("football match tonight").unwrap(),
            model.embed("football match tonight").unwrap()
        );
    }

    #[test]
    fn test_shared_vocabulary_is_closer() {
        let model = HashingEmbeddingModel::default();
        let a = model.embed("new rust compiler release notes").unwrap();
        let b = model.embed("rust compiler release performance").unwrap();
        let c = model.embed("weekend football league highlights").unwrap();
        let ab = cosine_similarity(&a, &b).unwrap();
        let ac = cosine_similarity(&a, &c).unwrap();
        assert!(ab > ac, "related {} should beat unrelated {}", ab, ac);
    }

    #[test]
    fn test_hashed_slot_stays_in_range() {
        for key in ["es", "pt-BR", "Lisbon", ""] {
            let slot = hashed_slot(key, 10, 5);
            assert!((10..15).contains(&slot));
        }
    }
}
