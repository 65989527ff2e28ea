//! Append-only interaction log and the time-decay model shared by all
//! behavioral scorers.

use crate::error::EngineError;
use crate::storage::InteractionRepository;
use crate::types::{InteractionEvent, InteractionType, UserInteraction};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Multiplier in [0, 1] applied to an interaction of `age_hours`.
///
/// Halves every `half_life_hours` of the interaction type.
pub fn temporal_decay(interaction_type: InteractionType, age_hours: f32) -> f32 {
    let age = age_hours.max(0.0);
    (-std::f32::consts::LN_2 * age / interaction_type.half_life_hours()).exp()
}

/// Base weight of an interaction type after time decay.
///
/// The magnitude shrinks with age; for negative types the signed value
/// therefore rises toward zero.
pub fn decay_weight(interaction_type: InteractionType, age_hours: f32) -> f32 {
    interaction_type.base_weight() * temporal_decay(interaction_type, age_hours)
}

/// Source of truth for behavioral signal.
pub struct InteractionLog {
    repo: Arc<dyn InteractionRepository>,
}

impl InteractionLog {
    pub fn new(repo: Arc<dyn InteractionRepository>) -> Self {
        Self { repo }
    }

    /// Persists an event, assigning an id and server timestamp when absent.
    ///
    /// Storage failures are returned as [`EngineError::StorageUnavailable`];
    /// an event is only reported as logged once the repository accepted it.
    #[instrument(skip_all, fields(user_id = %event.user_id, kind = %event.interaction_type))]
    pub async fn append(&self, event: InteractionEvent) -> Result<UserInteraction, EngineError> {
        if event.user_id.is_empty() || event.entity_id.is_empty() {
            return Err(EngineError::InvalidInput(
                "interaction requires user and entity ids".to_string(),
            ));
        }

        let interaction = UserInteraction {
            id: event
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: event.user_id,
            entity_id: event.entity_id,
            entity_type: event.entity_type,
            interaction_type: event.interaction_type,
            timestamp: event.timestamp.unwrap_or_else(Utc::now),
            metadata: event.metadata,
        };

        self.repo
            .append_interaction(&interaction)
            .await
            .map_err(|e| EngineError::StorageUnavailable(e.to_string()))?;

        debug!(id = %interaction.id, "Logged interaction");
        Ok(interaction)
    }

    /// Events of a user, most recent first, after skipping `offset`.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<UserInteraction>, EngineError> {
        let mut events = self.repo.interactions_for_user(user_id).await?;
        // Later appends win ties on equal timestamps
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    /// Events of a user no older than `since`, most recent first.
    pub async fn find_by_user_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<UserInteraction>, EngineError> {
        let events = self.find_by_user(user_id, usize::MAX, 0).await?;
        Ok(events
            .into_iter()
            .take_while(|e| e.timestamp >= since)
            .collect())
    }

    /// Events targeting an entity, oldest first.
    pub async fn find_by_entity(&self, entity_id: &str) -> Result<Vec<UserInteraction>, EngineError> {
        Ok(self.repo.interactions_for_entity(entity_id).await?)
    }

    pub async fn count_by_user(&self, user_id: &str) -> Result<usize, EngineError> {
        Ok(self.repo.interactions_for_user(user_id).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::test_utils::FailingStore;
    use crate::types::EntityKind;
    use chrono::Duration;

    fn log() -> InteractionLog {
        InteractionLog::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn test_decay_is_monotonic() {
        for t in InteractionType::ALL {
            let mut previous = f32::INFINITY;
            for age in [0.0, 1.0, 12.0, 48.0, 200.0, 1000.0] {
                let factor = temporal_decay(t, age);
                assert!(factor < previous, "{} not decreasing at {}h", t, age);
                previous = factor;
            }
        }
        let fresh = decay_weight(InteractionType::Like, 1.0);
        let stale = decay_weight(InteractionType::Like, 100.0);
        assert!(fresh > stale);
    }

    #[test]
    fn test_negative_weights_fade_toward_zero() {
        for t in [InteractionType::Dislike, InteractionType::Report] {
            let fresh = decay_weight(t, 1.0);
            let stale = decay_weight(t, 100.0);
            assert!(fresh < 0.0 && stale < 0.0);
            assert!(stale > fresh, "{} should fade toward zero", t);
            assert!(stale.abs() < fresh.abs());
        }
    }

    #[test]
    fn test_decay_halves_at_half_life() {
        let w0 = decay_weight(InteractionType::Like, 0.0);
        let w1 = decay_weight(InteractionType::Like, 168.0);
        assert!((w1 - w0 / 2.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_append_assigns_id_and_timestamp() {
        let log = log();
        let before = Utc::now();
        let logged = log
            .append(InteractionEvent::new(
                "u1",
                "p1",
                EntityKind::Post,
                InteractionType::Like,
            ))
            .await
            .unwrap();

        assert!(!logged.id.is_empty());
        assert!(logged.timestamp >= before);
    }

    #[tokio::test]
    async fn test_append_keeps_supplied_fields() {
        let log = log();
        let at = Utc::now() - Duration::hours(3);
        let mut event = InteractionEvent::new("u1", "p1", EntityKind::Post, InteractionType::Save)
            .with_timestamp(at);
        event.id = Some("fixed".to_string());

        let logged = log.append(event).await.unwrap();
        assert_eq!(logged.id, "fixed");
        assert_eq!(logged.timestamp, at);
    }

    #[tokio::test]
    async fn test_find_by_user_most_recent_first() {
        let log = log();
        let now = Utc::now();
        for (entity, hours) in [("p1", 5), ("p2", 1), ("p3", 10)] {
            log.append(
                InteractionEvent::new("u1", entity, EntityKind::Post, InteractionType::LongView)
                    .with_timestamp(now - Duration::hours(hours)),
            )
            .await
            .unwrap();
        }

        let entities: Vec<String> = log
            .find_by_user("u1", 10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.entity_id)
            .collect();
        assert_eq!(entities, vec!["p2", "p1", "p3"]);

        let page = log.find_by_user("u1", 1, 1).await.unwrap();
        assert_eq!(page[0].entity_id, "p1");

        let recent = log
            .find_by_user_since("u1", now - Duration::hours(6))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_append_rejects_missing_ids() {
        let err = log()
            .append(InteractionEvent::new(
                "",
                "p1",
                EntityKind::Post,
                InteractionType::Like,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let log = InteractionLog::new(Arc::new(FailingStore));
        let err = log
            .append(InteractionEvent::new(
                "u1",
                "p1",
                EntityKind::Post,
                InteractionType::Like,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StorageUnavailable(_)));
    }
}
