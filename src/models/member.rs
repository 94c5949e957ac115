use serde::{Deserialize, Serialize};

use super::performance::PerformanceReport;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStreak {
    pub current_days: u32,
    pub longest_days: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstStoryCompleted,
    Bookworm,
    WordSmith,
    WeekStreak,
    MonthStreak,
    Critic,
}

impl Achievement {
    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstStoryCompleted => "First story completed",
            Achievement::Bookworm => "Completed 10 stories",
            Achievement::WordSmith => "Read 100,000 words",
            Achievement::WeekStreak => "7-day reading streak",
            Achievement::MonthStreak => "30-day reading streak",
            Achievement::Critic => "Rated 10 stories",
        }
    }
}

/// Per-member reading totals as stored, before any scoring.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingTotals {
    pub words_read: u64,
    pub stories_started: u64,
    pub stories_completed: u64,
    pub ratings_given: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSummary {
    pub words_read: u64,
    pub stories_started: u64,
    pub stories_completed: u64,
    pub ratings_given: u64,
    pub completion_rate: f64,
    pub streak: ReadingStreak,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberDashboard {
    pub member_id: i64,
    pub display_name: String,
    pub report: PerformanceReport,
    pub reading: ReadingSummary,
}
