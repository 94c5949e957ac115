use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Story,
    Member,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Story => "story",
            EntityKind::Member => "member",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "story" => Ok(EntityKind::Story),
            "member" => Ok(EntityKind::Member),
            other => Err(AppError::validation(format!("unknown entity kind: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn story(id: i64) -> Self {
        Self {
            kind: EntityKind::Story,
            id,
        }
    }

    pub fn member(id: i64) -> Self {
        Self {
            kind: EntityKind::Member,
            id,
        }
    }
}

/// Time window a snapshot is aggregated over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MetricsWindow {
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "90d")]
    NinetyDays,
    #[serde(rename = "all")]
    AllTime,
}

impl MetricsWindow {
    pub const ALL: [MetricsWindow; 4] = [
        MetricsWindow::SevenDays,
        MetricsWindow::ThirtyDays,
        MetricsWindow::NinetyDays,
        MetricsWindow::AllTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsWindow::SevenDays => "7d",
            MetricsWindow::ThirtyDays => "30d",
            MetricsWindow::NinetyDays => "90d",
            MetricsWindow::AllTime => "all",
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            MetricsWindow::SevenDays => Some(Duration::days(7)),
            MetricsWindow::ThirtyDays => Some(Duration::days(30)),
            MetricsWindow::NinetyDays => Some(Duration::days(90)),
            MetricsWindow::AllTime => None,
        }
    }

    /// Inclusive lower bound of the window ending at `end`.
    pub fn start(&self, end: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.duration().map(|duration| end - duration)
    }
}

impl Default for MetricsWindow {
    fn default() -> Self {
        MetricsWindow::ThirtyDays
    }
}

impl fmt::Display for MetricsWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricsWindow {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricsWindow::ALL
            .into_iter()
            .find(|window| window.as_str() == value)
            .ok_or_else(|| AppError::validation(format!("unknown metrics window: {value}")))
    }
}

/// Activity count observed at a point in time (one bucket per day in practice).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPoint {
    pub at: DateTime<Utc>,
    pub count: u64,
}

impl ActivityPoint {
    pub fn new(at: DateTime<Utc>, count: u64) -> Self {
        Self { at, count }
    }
}

/// Raw counts for one entity, all sampled from the same store state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub view_count: u64,
    pub total_readers: u64,
    pub completed_readers: u64,
    pub average_rating: f64,
    pub total_ratings: u64,
    pub word_count: u64,
    pub days_since_published: u64,
    pub recent_view_counts: Vec<ActivityPoint>,
    pub recent_rating_counts: Vec<ActivityPoint>,
    pub bookmark_count: u64,
    pub share_count: u64,
    pub short_sessions: u64,
    pub captured_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Snapshot with every count at zero, for entities that have no activity yet.
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            view_count: 0,
            total_readers: 0,
            completed_readers: 0,
            average_rating: 0.0,
            total_ratings: 0,
            word_count: 0,
            days_since_published: 0,
            recent_view_counts: Vec::new(),
            recent_rating_counts: Vec::new(),
            bookmark_count: 0,
            share_count: 0,
            short_sessions: 0,
            captured_at,
        }
    }
}

/// Parameters for one collector call.
#[derive(Debug, Clone, Copy)]
pub struct CollectRequest {
    pub entity: EntityRef,
    pub window: MetricsWindow,
    pub captured_at: DateTime<Utc>,
    pub trending_window_days: u32,
    pub bounce_threshold_percent: f64,
}
