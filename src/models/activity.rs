use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Draft,
    Published,
    Archived,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "draft",
            StoryStatus::Published => "published",
            StoryStatus::Archived => "archived",
        }
    }
}

impl FromStr for StoryStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(StoryStatus::Draft),
            "published" => Ok(StoryStatus::Published),
            "archived" => Ok(StoryStatus::Archived),
            other => Err(AppError::validation(format!("unknown story status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Bookmark,
    Share,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Bookmark => "bookmark",
            InteractionKind::Share => "share",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub joined_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCreateInput {
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
    pub word_count: u64,
    pub status: StoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCreateInput {
    pub title: String,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub status: Option<StoryStatus>,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub id: i64,
    pub story_id: i64,
    pub member_id: i64,
    pub rating: u8,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    pub story_id: i64,
    pub member_id: i64,
    pub rating: u8,
    /// Backfilled activity carries its original time; live writes leave it empty.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingHistoryRecord {
    pub id: i64,
    pub story_id: i64,
    pub member_id: i64,
    pub reading_progress: f64,
    pub started_at: String,
    pub last_read_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl ReadingHistoryRecord {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some() || self.reading_progress >= 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgressInput {
    pub story_id: i64,
    pub member_id: i64,
    pub reading_progress: f64,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInput {
    pub story_id: i64,
    #[serde(default)]
    pub member_id: Option<i64>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionInput {
    pub story_id: i64,
    #[serde(default)]
    pub member_id: Option<i64>,
    pub kind: InteractionKind,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryUpdateInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub word_count: Option<u64>,
}

/// Outcome of a write that may have changed cached analytics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome<T> {
    pub record: T,
    pub invalidated_entries: usize,
}
