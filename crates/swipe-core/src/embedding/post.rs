//! Post embeddings from text, tags and engagement.

use super::model::EmbeddingModel;
use super::traits::EmbeddingBuilder;
use crate::config::EmbeddingConfig;
use crate::error::EngineError;
use crate::types::{ContentItem, EmbeddingVector, EngagementStats, Metadata};
use crate::vector;
use serde_json::Value;
use std::sync::Arc;

/// Builds post embeddings with a pluggable text model.
///
/// The vector is `text_weight * text + tag_weight * tags +
/// engagement_weight * engagement`, normalized. Engagement counters are
/// compressed with `log10(1 + x) / scale` so viral outliers don't dominate.
pub struct PostEmbeddingBuilder {
    config: EmbeddingConfig,
    model: Arc<dyn EmbeddingModel>,
}

impl PostEmbeddingBuilder {
    pub fn new(config: EmbeddingConfig, model: Arc<dyn EmbeddingModel>) -> Self {
        Self { config, model }
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EngineError> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.config.dimension]);
        }
        let raw = self.model.embed(text)?;
        Ok(vector::resize(&raw, self.config.dimension))
    }

    fn engagement_vector(&self, stats: &EngagementStats) -> Vec<f32> {
        let scale = self.config.engagement_log_scale.max(f32::EPSILON);
        let compress = |x: f32| (1.0 + x.max(0.0)).log10() / scale;
        let features = [
            compress(stats.views as f32),
            compress(stats.likes as f32),
            compress(stats.comments as f32),
            compress(stats.shares as f32),
            compress(stats.saves as f32),
            compress(stats.engagement_rate() * 100.0),
        ];
        vector::resize(&features, self.config.dimension)
    }
}

impl EmbeddingBuilder for PostEmbeddingBuilder {
    type Input = ContentItem;

    fn validate(&self, item: &ContentItem) -> bool {
        !item.id.is_empty()
            && (!item.text.trim().is_empty()
                || item.tags.iter().any(|t| !t.trim().is_empty())
                || !item.engagement.is_empty())
    }

    fn build(&self, item: &ContentItem) -> Result<EmbeddingVector, EngineError> {
        if !self.validate(item) {
            return Err(EngineError::InvalidInput(format!(
                "post {:?} has no text, tags or engagement",
                item.id
            )));
        }

        let text = self.embed_text(&item.text)?;
        let tags = self.embed_text(&item.tags.join(" "))?;
        let engagement = self.engagement_vector(&item.engagement);

        let mut values = vector::combine(
            &[text, tags, engagement],
            &[
                self.config.text_weight,
                self.config.tag_weight,
                self.config.engagement_weight,
            ],
        )?;
        vector::normalize_in_place(&mut values);
        Ok(EmbeddingVector::new(values))
    }

    fn blend_ratios(&self) -> (f32, f32) {
        (self.config.blend_current, self.config.blend_new)
    }

    fn metadata(&self, item: &ContentItem) -> Metadata {
        let mut topics: Vec<String> = item
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        topics.sort();
        topics.dedup();

        let mut metadata = Metadata::new();
        metadata.insert("topics".into(), Value::from(topics));
        metadata.insert(
            "content_length".into(),
            Value::from(item.text.chars().count() as u64),
        );
        metadata.insert("author_id".into(), Value::from(item.author_id.clone()));
        metadata
    }
}
