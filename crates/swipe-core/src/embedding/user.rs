//! User embeddings from behavior, viewing habits and stated preferences.
//!
//! The vector is four fixed-width sub-vectors, each normalized on its own so
//! no signal family drowns the others, concatenated and resized to the
//! configured dimension:
//!
//! | range | content |
//! |-------|---------|
//! | interaction histogram | decayed weight per interaction type, then hashed per entity |
//! | viewing patterns | duration, completion and frequency of up to 10 categories |
//! | preferences | one slot per known topic, hashed slots for the rest |
//! | demographics | age bucket, hashed location and language |

use super::model::hashed_slot;
use super::traits::EmbeddingBuilder;
use crate::config::{
    EmbeddingConfig, DEMOGRAPHIC_DIM, INTERACTION_HISTOGRAM_DIM, PREFERENCE_DIM,
    VIEWING_PATTERN_DIM,
};
use crate::error::EngineError;
use crate::interaction::decay_weight;
use crate::types::{
    Demographics, EmbeddingVector, InteractionType, Metadata, UserInteraction, UserProfile,
    ViewingPattern,
};
use crate::vector;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

/// Topics with a dedicated preference slot; others are hashed into the
/// remaining slots.
static KNOWN_TOPICS: Lazy<HashMap<&'static str, usize>> = Lazy::new(|| {
    [
        "technology",
        "sports",
        "music",
        "art",
        "food",
        "travel",
        "fashion",
        "gaming",
        "science",
        "news",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, t)| (t, i))
    .collect()
});

const MAX_VIEWING_PATTERNS: usize = 10;
const AGE_BUCKETS: usize = 6;
const MAX_DOMINANT_INTERESTS: usize = 5;

/// Everything known about a user at build time.
#[derive(Debug, Clone, Default)]
pub struct UserSignals {
    /// Most recent first.
    pub interactions: Vec<UserInteraction>,
    pub viewing_patterns: Vec<ViewingPattern>,
    pub preferences: Vec<String>,
    pub demographics: Option<Demographics>,
    /// Reference time for decay; `Utc::now()` when absent.
    pub now: Option<DateTime<Utc>>,
}

impl UserSignals {
    /// Signals from a profile plus its interaction history.
    pub fn from_profile(profile: &UserProfile, interactions: Vec<UserInteraction>) -> Self {
        Self {
            interactions,
            viewing_patterns: profile.viewing_patterns.clone(),
            preferences: profile.interests.clone(),
            demographics: profile.demographics.clone(),
            now: None,
        }
    }
}

/// Builds user embeddings.
#[derive(Debug, Clone)]
pub struct UserEmbeddingBuilder {
    config: EmbeddingConfig,
}

impl UserEmbeddingBuilder {
    pub fn new(config: EmbeddingConfig) -> Self {
        Self { config }
    }

    fn interaction_histogram(&self, signals: &UserSignals) -> Vec<f32> {
        let now = signals.now.unwrap_or_else(Utc::now);
        let type_slots = InteractionType::ALL.len();
        let mut out = vec![0.0f32; INTERACTION_HISTOGRAM_DIM];

        for interaction in signals.interactions.iter().take(self.config.user_history_limit) {
            let weight = decay_weight(interaction.interaction_type, interaction.age_hours(now));
            out[interaction.interaction_type.index()] += weight.abs();
            let slot = hashed_slot(
                &interaction.entity_id,
                type_slots,
                INTERACTION_HISTOGRAM_DIM - type_slots,
            );
            out[slot] += weight;
        }
        vector::normalize_l2(&out)
    }

    fn viewing_pattern_stats(patterns: &[ViewingPattern]) -> Vec<f32> {
        let mut out = vec![0.0f32; VIEWING_PATTERN_DIM];
        for (i, p) in patterns.iter().take(MAX_VIEWING_PATTERNS).enumerate() {
            out[i * 3] = (p.avg_duration_secs / 100.0).clamp(0.0, 1.0);
            out[i * 3 + 1] = p.completion_rate.clamp(0.0, 1.0);
            out[i * 3 + 2] = (p.frequency / 10.0).clamp(0.0, 1.0);
        }
        vector::normalize_l2(&out)
    }

    fn preference_vector(preferences: &[String]) -> Vec<f32> {
        let known = KNOWN_TOPICS.len();
        let mut out = vec![0.0f32; PREFERENCE_DIM];
        for pref in preferences {
            let key = pref.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let slot = match KNOWN_TOPICS.get(key.as_str()) {
                Some(&i) => i,
                None => hashed_slot(&key, known, PREFERENCE_DIM - known),
            };
            out[slot] = 1.0;
        }
        vector::normalize_l2(&out)
    }

    fn demographic_vector(demographics: Option<&Demographics>) -> Vec<f32> {
        let mut out = vec![0.0f32; DEMOGRAPHIC_DIM];
        let Some(d) = demographics else {
            return out;
        };
        if let Some(age) = d.age {
            let bucket = match age {
                0..=17 => 0,
                18..=24 => 1,
                25..=34 => 2,
                35..=44 => 3,
                45..=54 => 4,
                _ => 5,
            };
            out[bucket] = 1.0;
        }
        let half = (DEMOGRAPHIC_DIM - AGE_BUCKETS) / 2;
        if let Some(location) = &d.location {
            out[hashed_slot(&location.to_lowercase(), AGE_BUCKETS, half)] = 1.0;
        }
        if let Some(language) = &d.language {
            out[hashed_slot(&language.to_lowercase(), AGE_BUCKETS + half, half)] = 1.0;
        }
        vector::normalize_l2(&out)
    }
}

impl EmbeddingBuilder for UserEmbeddingBuilder {
    type Input = UserSignals;

    fn validate(&self, input: &UserSignals) -> bool {
        !input.interactions.is_empty()
            || !input.viewing_patterns.is_empty()
            || input.preferences.iter().any(|p| !p.trim().is_empty())
            || input.demographics.is_some()
    }

    fn build(&self, input: &UserSignals) -> Result<EmbeddingVector, EngineError> {
        let mut values = Vec::with_capacity(
            INTERACTION_HISTOGRAM_DIM + VIEWING_PATTERN_DIM + PREFERENCE_DIM + DEMOGRAPHIC_DIM,
        );
        values.extend(self.interaction_histogram(input));
        values.extend(Self::viewing_pattern_stats(&input.viewing_patterns));
        values.extend(Self::preference_vector(&input.preferences));
        values.extend(Self::demographic_vector(input.demographics.as_ref()));

        let mut values = vector::resize(&values, self.config.dimension);
        vector::normalize_in_place(&mut values);
        Ok(EmbeddingVector::new(values))
    }

    fn blend_ratios(&self) -> (f32, f32) {
        (self.config.blend_current, self.config.blend_new)
    }

    fn metadata(&self, input: &UserSignals) -> Metadata {
        let now = input.now.unwrap_or_else(Utc::now);
        let window_start = now - Duration::days(self.config.activity_window_days);
        let recent = input
            .interactions
            .iter()
            .filter(|i| i.timestamp >= window_start)
            .count();

        let mut metadata = Metadata::new();
        metadata.insert(
            "dominant_interests".into(),
            Value::from(
                input
                    .preferences
                    .iter()
                    .take(MAX_DOMINANT_INTERESTS)
                    .cloned()
                    .collect::<Vec<_>>(),
            ),
        );
        metadata.insert(
            "activeness_factor".into(),
            Value::from((recent as f64 / 100.0).min(1.0)),
        );
        metadata.insert(
            "interaction_count".into(),
            Value::from(input.interactions.len() as u64),
        );
        metadata
    }
}
