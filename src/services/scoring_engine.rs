//! Pure math for turning raw reading metrics into scores and rates.
//!
//! Nothing here touches storage or the clock: every function is a
//! deterministic function of its arguments, which is what lets cached
//! results be recomputed concurrently without coordination. Ratios with a
//! zero denominator yield `0.0` ("no data yet") instead of an error.

use chrono::{DateTime, Utc};

use crate::models::metrics::{ActivityPoint, EntityRef, MetricsSnapshot, MetricsWindow};
use crate::models::performance::{
    PerformanceBadge, PerformanceLevel, PerformanceReport, PerformanceScore, ScoreBreakdown,
};
use crate::models::settings::{
    ScoringSettings, DEFAULT_TRENDING_HALF_LIFE_DAYS, DEFAULT_TRENDING_RATING_WEIGHT,
    DEFAULT_TRENDING_WINDOW_DAYS,
};

// Component caps; they sum to 100.
const VIEWS_CAP: f64 = 30.0;
const COMPLETION_CAP: f64 = 25.0;
const RATING_CAP: f64 = 20.0;
const POPULARITY_CAP: f64 = 15.0;
const FRESHNESS_CAP: f64 = 10.0;

const VIEWS_SATURATION: f64 = 100.0;
const POPULARITY_SATURATION: f64 = 10.0;
const MAX_RATING: f64 = 5.0;
const FRESHNESS_DECAY_DAYS: f64 = 30.0;

pub const EXCELLENT_THRESHOLD: i32 = 80;
pub const GOOD_THRESHOLD: i32 = 60;
pub const AVERAGE_THRESHOLD: i32 = 40;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Recency weighting used by [`calculate_trending_score`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendingConfig {
    /// Activity at or beyond this age contributes nothing.
    pub window_days: u32,
    /// Age at which an activity's weight has halved.
    pub half_life_days: f64,
    /// Multiplier applied to rating activity relative to a view.
    pub rating_weight: f64,
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_TRENDING_WINDOW_DAYS,
            half_life_days: DEFAULT_TRENDING_HALF_LIFE_DAYS,
            rating_weight: DEFAULT_TRENDING_RATING_WEIGHT,
        }
    }
}

/// Completion percentage rounded to two decimals; `0.0` when nobody started.
pub fn calculate_completion_rate(total_readers: u64, completed_readers: u64) -> f64 {
    ratio_percent(completed_readers as f64, total_readers as f64)
}

/// Active interactions per view, as a percentage.
pub fn calculate_engagement_rate(views: u64, ratings: u64, bookmarks: u64, shares: u64) -> f64 {
    let interactions = ratings.saturating_add(bookmarks).saturating_add(shares);
    ratio_percent(interactions as f64, views as f64)
}

/// Share of views that ended as a short (bounced) session, as a percentage.
pub fn calculate_bounce_rate(views: u64, short_sessions: u64) -> f64 {
    ratio_percent(short_sessions as f64, views as f64)
}

pub fn calculate_score_breakdown(snapshot: &MetricsSnapshot) -> ScoreBreakdown {
    let completion_rate =
        calculate_completion_rate(snapshot.total_readers, snapshot.completed_readers);

    ScoreBreakdown {
        views: bounded(
            snapshot.view_count as f64 / VIEWS_SATURATION * VIEWS_CAP,
            VIEWS_CAP,
        ),
        completion: bounded(completion_rate / 100.0 * COMPLETION_CAP, COMPLETION_CAP),
        rating: bounded(snapshot.average_rating / MAX_RATING * RATING_CAP, RATING_CAP),
        rating_popularity: bounded(
            snapshot.total_ratings as f64 / POPULARITY_SATURATION * POPULARITY_CAP,
            POPULARITY_CAP,
        ),
        freshness: bounded(
            FRESHNESS_CAP - snapshot.days_since_published as f64 / FRESHNESS_DECAY_DAYS,
            FRESHNESS_CAP,
        ),
    }
}

/// Composite 0-100 score: views, completion, rating, rating volume and freshness.
pub fn calculate_performance_score(snapshot: &MetricsSnapshot) -> i32 {
    score_from_breakdown(&calculate_score_breakdown(snapshot))
}

fn score_from_breakdown(breakdown: &ScoreBreakdown) -> i32 {
    breakdown.total().round().clamp(0.0, 100.0) as i32
}

pub fn classify_performance_level(score: i32) -> PerformanceLevel {
    if score >= EXCELLENT_THRESHOLD {
        PerformanceLevel::Excellent
    } else if score >= GOOD_THRESHOLD {
        PerformanceLevel::Good
    } else if score >= AVERAGE_THRESHOLD {
        PerformanceLevel::Average
    } else {
        PerformanceLevel::Poor
    }
}

pub fn classify_performance_badge(score: i32) -> PerformanceBadge {
    classify_performance_level(score).badge()
}

/// Recency-weighted activity inside the trending window.
///
/// Each point contributes `count * weight * 0.5^(age / half_life)` while its
/// age is below `window_days`; older points contribute nothing. Points dated
/// after `now` are treated as happening at `now`.
pub fn calculate_trending_score(
    views: &[ActivityPoint],
    ratings: &[ActivityPoint],
    now: DateTime<Utc>,
    config: &TrendingConfig,
) -> f64 {
    let weighted = |points: &[ActivityPoint], weight: f64| -> f64 {
        points
            .iter()
            .map(|point| point.count as f64 * weight * recency_weight(point.at, now, config))
            .sum::<f64>()
    };

    let score = weighted(views, 1.0) + weighted(ratings, config.rating_weight.max(0.0));
    if score.is_finite() {
        score.max(0.0)
    } else {
        0.0
    }
}

fn recency_weight(at: DateTime<Utc>, now: DateTime<Utc>, config: &TrendingConfig) -> f64 {
    let age_days = ((now - at).num_seconds() as f64 / SECONDS_PER_DAY).max(0.0);
    if age_days >= config.window_days as f64 {
        return 0.0;
    }
    if config.half_life_days > 0.0 {
        0.5_f64.powf(age_days / config.half_life_days)
    } else {
        1.0
    }
}

fn ratio_percent(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        return 0.0;
    }
    round2((numerator / denominator * 100.0).clamp(0.0, 100.0))
}

fn bounded(value: f64, cap: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, cap)
    } else {
        0.0
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scoring entry point used by the services; holds the tunable trending config.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoringEngine {
    trending: TrendingConfig,
}

impl ScoringEngine {
    pub fn new(trending: TrendingConfig) -> Self {
        Self { trending }
    }

    pub fn from_settings(settings: &ScoringSettings) -> Self {
        Self::new(TrendingConfig {
            window_days: settings.trending_window_days,
            half_life_days: settings.trending_half_life_days,
            rating_weight: settings.trending_rating_weight,
        })
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> PerformanceScore {
        let score = calculate_performance_score(snapshot);
        let level = classify_performance_level(score);
        PerformanceScore {
            score,
            level,
            badge: level.badge(),
        }
    }

    /// Trending score measured from the snapshot's own capture instant.
    pub fn trending_score(&self, snapshot: &MetricsSnapshot) -> f64 {
        calculate_trending_score(
            &snapshot.recent_view_counts,
            &snapshot.recent_rating_counts,
            snapshot.captured_at,
            &self.trending,
        )
    }

    pub fn report(
        &self,
        entity: EntityRef,
        window: MetricsWindow,
        snapshot: &MetricsSnapshot,
    ) -> PerformanceReport {
        let breakdown = calculate_score_breakdown(snapshot);
        let score = score_from_breakdown(&breakdown);
        let level = classify_performance_level(score);

        PerformanceReport {
            entity,
            window,
            performance: PerformanceScore {
                score,
                level,
                badge: level.badge(),
            },
            breakdown,
            completion_rate: calculate_completion_rate(
                snapshot.total_readers,
                snapshot.completed_readers,
            ),
            engagement_rate: calculate_engagement_rate(
                snapshot.view_count,
                snapshot.total_ratings,
                snapshot.bookmark_count,
                snapshot.share_count,
            ),
            bounce_rate: calculate_bounce_rate(snapshot.view_count, snapshot.short_sessions),
            trending_score: self.trending_score(snapshot),
            view_count: snapshot.view_count,
            total_ratings: snapshot.total_ratings,
            average_rating: round2(bounded(snapshot.average_rating, MAX_RATING)),
            computed_at: snapshot.captured_at,
        }
    }
}
