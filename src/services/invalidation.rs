use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::metrics::{EntityKind, EntityRef};
use crate::services::cache_service::ScoreCache;

/// Hook that write paths call after a committed change to an entity.
pub trait EntityMutationListener: Send + Sync {
    /// Returns the number of cache entries dropped.
    fn on_entity_mutated(&self, kind: EntityKind, id: i64) -> AppResult<usize>;

    fn apply(&self, event: &MutationEvent) -> AppResult<usize> {
        let mut removed = 0;
        for entity in event.affected_entities() {
            removed += self.on_entity_mutated(entity.kind, entity.id)?;
        }
        info!(
            target: "app::cache",
            event = event.name(),
            removed,
            "applied mutation event"
        );
        Ok(removed)
    }
}

/// Writes that change a computed score.
///
/// Plain views and reading progress below completion are not listed; their
/// effect shows up once cached entries reach their TTL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum MutationEvent {
    #[serde(rename_all = "camelCase")]
    RatingCreated { story_id: i64, member_id: i64 },
    #[serde(rename_all = "camelCase")]
    RatingUpdated { story_id: i64, member_id: i64 },
    #[serde(rename_all = "camelCase")]
    RatingDeleted { story_id: i64, member_id: i64 },
    #[serde(rename_all = "camelCase")]
    ReadingCompleted { story_id: i64, member_id: i64 },
    #[serde(rename_all = "camelCase")]
    StoryPublished {
        story_id: i64,
        author_id: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    StoryUpdated {
        story_id: i64,
        author_id: Option<i64>,
    },
}

impl MutationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MutationEvent::RatingCreated { .. } => "rating_created",
            MutationEvent::RatingUpdated { .. } => "rating_updated",
            MutationEvent::RatingDeleted { .. } => "rating_deleted",
            MutationEvent::ReadingCompleted { .. } => "reading_completed",
            MutationEvent::StoryPublished { .. } => "story_published",
            MutationEvent::StoryUpdated { .. } => "story_updated",
        }
    }

    /// Entities whose cached reports the event makes stale.
    pub fn affected_entities(&self) -> Vec<EntityRef> {
        match *self {
            MutationEvent::RatingCreated {
                story_id,
                member_id,
            }
            | MutationEvent::RatingUpdated {
                story_id,
                member_id,
            }
            | MutationEvent::RatingDeleted {
                story_id,
                member_id,
            }
            | MutationEvent::ReadingCompleted {
                story_id,
                member_id,
            } => vec![EntityRef::story(story_id), EntityRef::member(member_id)],
            MutationEvent::StoryPublished {
                story_id,
                author_id,
            }
            | MutationEvent::StoryUpdated {
                story_id,
                author_id,
            } => {
                let mut entities = vec![EntityRef::story(story_id)];
                entities.extend(author_id.map(EntityRef::member));
                entities
            }
        }
    }
}

/// Drops cached entries for a mutated entity and every platform aggregate.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: Arc<dyn ScoreCache>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn ScoreCache>) -> Self {
        Self { cache }
    }
}

impl EntityMutationListener for CacheInvalidator {
    fn on_entity_mutated(&self, kind: EntityKind, id: i64) -> AppResult<usize> {
        let entity_entries = self.cache.invalidate_for_entity(kind, id)?;
        let aggregate_entries = self.cache.invalidate_aggregates()?;
        debug!(
            target: "app::cache",
            entity_type = %kind,
            entity_id = id,
            entity_entries,
            aggregate_entries,
            "entity mutated"
        );
        Ok(entity_entries + aggregate_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::MetricsWindow;
    use crate::services::cache_service::{
        AggregateScope, CacheKey, CachedValue, InMemoryScoreCache,
    };
    use chrono::Duration;

    fn seeded_cache() -> Arc<InMemoryScoreCache> {
        let cache = Arc::new(InMemoryScoreCache::default());
        let ttl = Duration::minutes(15);
        for window in MetricsWindow::ALL {
            cache
                .put(
                    CacheKey::entity(EntityKind::Story, 1, window),
                    CachedValue::Ranking(Vec::new()),
                    ttl,
                )
                .unwrap();
        }
        cache
            .put(
                CacheKey::entity(EntityKind::Member, 9, MetricsWindow::AllTime),
                CachedValue::Ranking(Vec::new()),
                ttl,
            )
            .unwrap();
        cache
            .put(
                CacheKey::entity(EntityKind::Story, 2, MetricsWindow::AllTime),
                CachedValue::Ranking(Vec::new()),
                ttl,
            )
            .unwrap();
        cache
            .put(
                CacheKey::aggregate(AggregateScope::TopPerforming, MetricsWindow::ThirtyDays, 10),
                CachedValue::Ranking(Vec::new()),
                ttl,
            )
            .unwrap();
        cache
    }

    #[test]
    fn rating_event_touches_story_and_member() {
        let event = MutationEvent::RatingCreated {
            story_id: 1,
            member_id: 9,
        };
        assert_eq!(
            event.affected_entities(),
            vec![EntityRef::story(1), EntityRef::member(9)]
        );
    }

    #[test]
    fn story_event_without_author_touches_story_only() {
        let event = MutationEvent::StoryUpdated {
            story_id: 4,
            author_id: None,
        };
        assert_eq!(event.affected_entities(), vec![EntityRef::story(4)]);
    }

    #[test]
    fn listener_drops_entity_windows_and_aggregates() {
        let cache = seeded_cache();
        let invalidator = CacheInvalidator::new(cache.clone());

        let removed = invalidator.on_entity_mutated(EntityKind::Story, 1).unwrap();
        assert_eq!(removed, 5);
        assert_eq!(cache.len(), 2);
        assert!(cache
            .get(&CacheKey::entity(EntityKind::Story, 2, MetricsWindow::AllTime))
            .unwrap()
            .is_some());
    }

    #[test]
    fn apply_invalidates_every_affected_entity() {
        let cache = seeded_cache();
        let invalidator = CacheInvalidator::new(cache.clone());

        let removed = invalidator
            .apply(&MutationEvent::ReadingCompleted {
                story_id: 1,
                member_id: 9,
            })
            .unwrap();
        assert_eq!(removed, 6);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn events_serialize_with_camel_case_fields() {
        let json = serde_json::to_value(MutationEvent::RatingDeleted {
            story_id: 3,
            member_id: 5,
        })
        .unwrap();
        assert_eq!(json["event"], "ratingDeleted");
        assert_eq!(json["storyId"], 3);
        assert_eq!(json["memberId"], 5);
    }
}
