//! Weight normalization and contextual weight adjustment.

use super::temporal;
use crate::config::{CandidateWeights, ComponentWeights, RankingConfig};
use crate::types::RecommendationContext;

/// Clamps every weight to be non-negative and rescales them to sum to 1.
///
/// All-zero (or non-finite) input falls back to uniform weights.
pub fn normalize_weights<const N: usize>(weights: [f32; N]) -> [f32; N] {
    let mut clamped = weights.map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
    let sum: f32 = clamped.iter().sum();
    if sum <= f32::EPSILON {
        return [1.0 / N as f32; N];
    }
    for w in clamped.iter_mut() {
        *w /= sum;
    }
    clamped
}

pub(crate) fn component_weights(values: [f32; 6]) -> ComponentWeights {
    let [affinity, engagement, novelty, diversity, temporal, quality] = values;
    ComponentWeights {
        affinity,
        engagement,
        novelty,
        diversity,
        temporal,
        quality,
    }
}

pub(crate) fn candidate_weights(values: [f32; 5]) -> CandidateWeights {
    let [relevance, engagement, novelty, diversity, context] = values;
    CandidateWeights {
        relevance,
        engagement,
        novelty,
        diversity,
        context,
    }
}

/// What the weight adjustment needs to know about the user.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserActivity {
    pub interaction_count: usize,
    pub has_embedding: bool,
}

impl UserActivity {
    pub fn is_new(&self) -> bool {
        self.interaction_count == 0 && !self.has_embedding
    }
}

/// Cluster ranking weights for one request.
///
/// New users get the new-user modifiers multiplied in; power users,
/// night, lunch and weekend requests shift weight between components.
/// The result is clamped and renormalized.
pub fn adjust_cluster_weights(
    config: &RankingConfig,
    activity: UserActivity,
    context: Option<&RecommendationContext>,
) -> ComponentWeights {
    let mut w = config.weights;

    if activity.is_new() {
        let m = config.new_user_modifiers;
        w.affinity *= m.affinity;
        w.engagement *= m.engagement;
        w.novelty *= m.novelty;
        w.diversity *= m.diversity;
        w.temporal *= m.temporal;
        w.quality *= m.quality;
    } else if activity.interaction_count > config.power_user_threshold {
        w.diversity += 0.1;
        w.affinity -= 0.05;
        w.novelty += 0.05;
    }

    if let Some(ctx) = context {
        if let Some(hour) = ctx.time_of_day {
            if temporal::is_night(hour) {
                w.quality += 0.1;
                w.engagement -= 0.05;
            } else if temporal::is_lunch(hour) {
                w.temporal += 0.1;
                w.engagement -= 0.05;
            }
        }
        if ctx.is_weekend() {
            w.novelty += 0.1;
            w.quality -= 0.05;
        }
    }

    component_weights(normalize_weights(w.as_array()))
}

/// Candidate weights shifted by the requested novelty and diversity levels.
///
/// Novelty above its baseline moves weight from relevance and engagement
/// (half each) to novelty; diversity above its baseline moves weight from
/// relevance to diversity. Levels below the baselines shift the other way.
pub fn adjust_candidate_weights(
    base: CandidateWeights,
    novelty: f32,
    diversity: f32,
    novelty_baseline: f32,
    diversity_baseline: f32,
) -> CandidateWeights {
    let mut w = base;

    let novelty_shift = novelty - novelty_baseline;
    w.novelty += novelty_shift;
    w.relevance -= novelty_shift / 2.0;
    w.engagement -= novelty_shift / 2.0;

    let diversity_shift = diversity - diversity_baseline;
    w.diversity += diversity_shift;
    w.relevance -= diversity_shift;

    candidate_weights(normalize_weights(w.as_array()))
}
