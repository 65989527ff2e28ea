//! Final ranking of candidate posts.

use super::temporal;
use super::weights::adjust_candidate_weights;
use crate::config::{CandidateRankingConfig, CandidateWeights};
use crate::error::EngineError;
use crate::types::{ContentItem, RecommendationContext, RecommendationOptions};
use crate::vector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

/// Context factor when the candidate matches the request context.
const CONTEXT_MATCH_SCORE: f32 = 0.8;

/// A post proposed by candidate selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub item: ContentItem,
    pub cluster_id: String,
    /// Score of the cluster the candidate came from.
    pub cluster_score: f32,
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateFactors {
    pub relevance: f32,
    pub engagement: f32,
    pub novelty: f32,
    pub diversity: f32,
    pub context: f32,
}

impl CandidateFactors {
    pub fn neutral() -> Self {
        Self {
            relevance: 0.5,
            engagement: 0.5,
            novelty: 0.5,
            diversity: 0.5,
            context: 0.5,
        }
    }

    fn weighted_sum(&self, w: &CandidateWeights) -> f32 {
        self.relevance * w.relevance
            + self.engagement * w.engagement
            + self.novelty * w.novelty
            + self.diversity * w.diversity
            + self.context * w.context
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: String,
    pub cluster_id: String,
    pub score: f32,
    pub factors: CandidateFactors,
}

/// Scores candidates on relevance, engagement, novelty, diversity and
/// context, then orders and optionally diversifies them.
#[derive(Debug, Clone, Default)]
pub struct CandidateRanker {
    config: CandidateRankingConfig,
}

impl CandidateRanker {
    pub fn new(config: CandidateRankingConfig) -> Self {
        Self { config }
    }

    /// Ranks candidates best first, truncated to `options.limit`.
    ///
    /// With `options.diversity` at or above the diversify threshold the
    /// truncated list is interleaved by [`diversify`], so the result always
    /// holds the `limit` best scores. Returns `InvalidInput`
    /// for non-finite diversity or novelty levels.
    #[instrument(skip_all, fields(candidates = candidates.len(), limit = options.limit))]
    pub fn rank(
        &self,
        candidates: &[Candidate],
        user_embedding: Option<&[f32]>,
        options: &RecommendationOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedCandidate>, EngineError> {
        if !options.diversity.is_finite() || !options.novelty.is_finite() {
            return Err(EngineError::InvalidInput(
                "diversity and novelty must be finite".to_string(),
            ));
        }

        let weights = adjust_candidate_weights(
            self.config.weights,
            options.novelty.clamp(0.0, 1.0),
            options.diversity.clamp(0.0, 1.0),
            self.config.novelty_baseline,
            self.config.diversity_baseline,
        );

        let mut ranked: Vec<RankedCandidate> = candidates
            .iter()
            .map(|c| {
                let factors = self.factors(c, user_embedding, options.context.as_ref(), now);
                RankedCandidate {
                    id: c.item.id.clone(),
                    cluster_id: c.cluster_id.clone(),
                    score: factors.weighted_sum(&weights).clamp(0.0, 1.0),
                    factors,
                }
            })
            .collect();

        sort_descending(&mut ranked);
        ranked.truncate(options.limit);

        if options.diversity >= self.config.diversify_threshold {
            ranked = diversify(
                ranked,
                self.config.diversify_head_fraction,
                self.config.diversify_buckets,
            );
        }
        Ok(ranked)
    }

    /// Candidates in their given order with neutral factors.
    pub fn neutral(candidates: &[Candidate], limit: usize) -> Vec<RankedCandidate> {
        candidates
            .iter()
            .take(limit)
            .map(|c| RankedCandidate {
                id: c.item.id.clone(),
                cluster_id: c.cluster_id.clone(),
                score: 0.5,
                factors: CandidateFactors::neutral(),
            })
            .collect()
    }

    pub fn factors(
        &self,
        candidate: &Candidate,
        user_embedding: Option<&[f32]>,
        context: Option<&RecommendationContext>,
        now: DateTime<Utc>,
    ) -> CandidateFactors {
        CandidateFactors {
            relevance: self.relevance(candidate, user_embedding),
            engagement: self.engagement(&candidate.item),
            novelty: self.novelty(&candidate.item, now),
            diversity: 0.5,
            context: context_match(&candidate.item, context),
        }
    }

    fn relevance(&self, candidate: &Candidate, user_embedding: Option<&[f32]>) -> f32 {
        if let (Some(user), Some(item)) = (user_embedding, candidate.embedding.as_deref()) {
            match vector::cosine_similarity(user, item) {
                Ok(cos) => return ((cos + 1.0) / 2.0).clamp(0.0, 1.0),
                Err(e) => warn!(item_id = %candidate.item.id, error = %e, "Relevance from cluster score"),
            }
        }
        if candidate.cluster_score.is_finite() {
            return candidate.cluster_score.clamp(0.0, 1.0);
        }
        0.5
    }

    fn engagement(&self, item: &ContentItem) -> f32 {
        let e = &item.engagement;
        let weighted = e.likes as f32
            + 1.5 * e.comments as f32
            + 2.0 * e.shares as f32
            + 0.2 * e.views as f32;
        (weighted / self.config.engagement_saturation.max(f32::EPSILON)).min(1.0)
    }

    fn novelty(&self, item: &ContentItem, now: DateTime<Utc>) -> f32 {
        let age_hours = (now - item.created_at).num_seconds().max(0) as f32 / 3600.0;
        (-age_hours / self.config.novelty_decay_hours.max(f32::EPSILON)).exp()
    }
}

/// 0.8 when the item's `time_band` metadata matches the request hour or its
/// `language` matches the request language, else 0.5.
fn context_match(item: &ContentItem, context: Option<&RecommendationContext>) -> f32 {
    let Some(context) = context else {
        return 0.5;
    };
    let meta_str = |key: &str| item.metadata.get(key).and_then(Value::as_str);

    let band_match = match (context.time_of_day, meta_str("time_band")) {
        (Some(hour), Some(band)) => temporal::time_band(hour) == band,
        _ => false,
    };
    let language_match = match (context.language.as_deref(), meta_str("language")) {
        (Some(wanted), Some(lang)) => wanted.eq_ignore_ascii_case(lang),
        _ => false,
    };

    if band_match || language_match {
        CONTEXT_MATCH_SCORE
    } else {
        0.5
    }
}

fn sort_descending(ranked: &mut [RankedCandidate]) {
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

/// Interleaves a score-ordered list for variety.
///
/// The top `ceil(len * head_fraction)` entries keep their positions; the
/// rest is cut into `buckets` consecutive chunks of `ceil(rest / buckets)`
/// which are then merged round-robin. The output is a permutation of the
/// input.
pub fn diversify(
    ranked: Vec<RankedCandidate>,
    head_fraction: f32,
    buckets: usize,
) -> Vec<RankedCandidate> {
    let n = ranked.len();
    let buckets = buckets.max(1);
    // Fraction in thousandths keeps ceil exact for values like 0.3
    let permille = (head_fraction.clamp(0.0, 1.0) * 1000.0).round() as usize;
    let head_len = (n * permille).div_ceil(1000).min(n);

    let mut iter = ranked.into_iter();
    let mut out: Vec<RankedCandidate> = iter.by_ref().take(head_len).collect();
    let rest: Vec<RankedCandidate> = iter.collect();
    if rest.is_empty() {
        return out;
    }

    let chunk = rest.len().div_ceil(buckets);
    let mut chunks: Vec<std::vec::IntoIter<RankedCandidate>> = Vec::with_capacity(buckets);
    let mut rest = rest.into_iter();
    loop {
        let next: Vec<RankedCandidate> = rest.by_ref().take(chunk).collect();
        if next.is_empty() {
            break;
        }
        chunks.push(next.into_iter());
    }

    for _ in 0..chunk {
        for bucket in chunks.iter_mut() {
            if let Some(c) = bucket.next() {
                out.push(c);
            }
        }
    }
    out
}
