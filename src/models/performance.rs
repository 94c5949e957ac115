use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{EntityRef, MetricsWindow};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    Poor,
}

impl PerformanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceLevel::Excellent => "excellent",
            PerformanceLevel::Good => "good",
            PerformanceLevel::Average => "average",
            PerformanceLevel::Poor => "poor",
        }
    }

    pub fn badge(&self) -> PerformanceBadge {
        match self {
            PerformanceLevel::Excellent => PerformanceBadge::Fire,
            PerformanceLevel::Good => PerformanceBadge::ChartUp,
            PerformanceLevel::Average => PerformanceBadge::ChartFlat,
            PerformanceLevel::Poor => PerformanceBadge::ChartDown,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceBadge {
    Fire,
    ChartUp,
    ChartFlat,
    ChartDown,
}

impl PerformanceBadge {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceBadge::Fire => "fire",
            PerformanceBadge::ChartUp => "chart-up",
            PerformanceBadge::ChartFlat => "chart-flat",
            PerformanceBadge::ChartDown => "chart-down",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceScore {
    pub score: i32,
    pub level: PerformanceLevel,
    pub badge: PerformanceBadge,
}

/// The five capped components that add up to the performance score.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub views: f64,
    pub completion: f64,
    pub rating: f64,
    pub rating_popularity: f64,
    pub freshness: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.views + self.completion + self.rating + self.rating_popularity + self.freshness
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub entity: EntityRef,
    pub window: MetricsWindow,
    pub performance: PerformanceScore,
    pub breakdown: ScoreBreakdown,
    pub completion_rate: f64,
    pub engagement_rate: f64,
    pub bounce_rate: f64,
    pub trending_score: f64,
    pub view_count: u64,
    pub total_ratings: u64,
    pub average_rating: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedStory {
    pub rank: usize,
    pub story_id: i64,
    pub title: String,
    pub score: i32,
    pub level: PerformanceLevel,
    pub trending_score: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelDistribution {
    pub excellent: u64,
    pub good: u64,
    pub average: u64,
    pub poor: u64,
}

impl LevelDistribution {
    pub fn record(&mut self, level: PerformanceLevel) {
        match level {
            PerformanceLevel::Excellent => self.excellent += 1,
            PerformanceLevel::Good => self.good += 1,
            PerformanceLevel::Average => self.average += 1,
            PerformanceLevel::Poor => self.poor += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.excellent + self.good + self.average + self.poor
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOverview {
    pub window: MetricsWindow,
    pub story_count: u64,
    pub average_score: f64,
    pub average_completion_rate: f64,
    pub total_views: u64,
    pub level_distribution: LevelDistribution,
    pub computed_at: DateTime<Utc>,
}

pub const DEFAULT_RANKING_LIMIT: usize = 10;

/// Query parameters accepted by the analytics commands.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQueryParams {
    #[serde(default)]
    pub window: Option<MetricsWindow>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AnalyticsQueryParams {
    pub fn window(&self) -> MetricsWindow {
        self.window.unwrap_or_default()
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RANKING_LIMIT)
    }
}
