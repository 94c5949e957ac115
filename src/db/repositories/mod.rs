use chrono::{DateTime, Utc};

use crate::db::format_timestamp;
use crate::models::metrics::{EntityKind, MetricsWindow};

pub mod interaction_repository;
pub mod member_repository;
pub mod metrics_repository;
pub mod rating_repository;
pub mod reading_history_repository;
pub mod settings_repository;
pub mod story_repository;

/// Inclusive time range bound into queries as `:since` / `:until`.
/// A missing `since` means "from the beginning".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBounds {
    pub since: Option<String>,
    pub until: String,
}

impl TimeBounds {
    pub fn for_window(window: MetricsWindow, end: DateTime<Utc>) -> Self {
        Self {
            since: window.start(end).map(format_timestamp),
            until: format_timestamp(end),
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            since: Some(format_timestamp(start)),
            until: format_timestamp(end),
        }
    }
}

/// Column that ties an activity row to the entity being measured.
pub(crate) fn owner_column(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Story => "story_id",
        EntityKind::Member => "member_id",
    }
}
