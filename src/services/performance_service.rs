use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::member::MemberDashboard;
use crate::models::metrics::{CollectRequest, EntityKind, EntityRef, MetricsWindow};
use crate::models::performance::{
    LevelDistribution, PerformanceReport, PlatformOverview, RankedStory,
};
use crate::models::settings::ScoringSettings;
use crate::services::cache_service::{AggregateScope, CacheKey, CachedValue, ScoreCache};
use crate::services::metrics_collector::MetricsCollector;
use crate::services::reading_milestones::{calculate_reading_streak, summarize};
use crate::services::scoring_engine::{round2, ScoringEngine};
use crate::services::settings_service::SettingsService;

pub const MAX_RANKING_LIMIT: usize = 100;

/// Read side of the analytics core: collect, score, and memoize.
pub struct PerformanceService {
    collector: Arc<dyn MetricsCollector>,
    cache: Arc<dyn ScoreCache>,
    settings: Arc<SettingsService>,
}

impl PerformanceService {
    pub fn new(
        collector: Arc<dyn MetricsCollector>,
        cache: Arc<dyn ScoreCache>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            collector,
            cache,
            settings,
        }
    }

    pub fn story_report(&self, story_id: i64, window: MetricsWindow) -> AppResult<PerformanceReport> {
        let settings = self.settings.get()?;
        self.story_report_with(&settings, story_id, window)
    }

    pub fn member_dashboard(&self, member_id: i64, window: MetricsWindow) -> AppResult<MemberDashboard> {
        let key = CacheKey::entity(EntityKind::Member, member_id, window);
        if let Some(CachedValue::Member(dashboard)) = self.try_get_cache(&key) {
            return Ok(dashboard);
        }

        let settings = self.settings.get()?;
        let engine = ScoringEngine::from_settings(&settings);
        let captured_at = Utc::now();

        let member = self.collector.member(member_id)?;
        let entity = EntityRef::member(member_id);
        let snapshot = self
            .collector
            .collect(&collect_request(&settings, entity, window, captured_at))?;
        let report = engine.report(entity, window, &snapshot);

        let totals = self.collector.reading_totals(member_id, window, captured_at)?;
        let days = self.collector.reading_days(member_id)?;
        let streak = calculate_reading_streak(&days, captured_at.date_naive());

        let dashboard = MemberDashboard {
            member_id,
            display_name: member.display_name,
            report,
            reading: summarize(totals, streak),
        };

        self.insert_cache(key, CachedValue::Member(dashboard.clone()), settings.cache_ttl());
        Ok(dashboard)
    }

    /// Published stories ordered by performance score, best first.
    pub fn top_performing_stories(
        &self,
        window: MetricsWindow,
        limit: usize,
    ) -> AppResult<Vec<RankedStory>> {
        self.ranking(AggregateScope::TopPerforming, window, limit, |a, b| {
            b.performance
                .score
                .cmp(&a.performance.score)
                .then_with(|| cmp_f64_desc(a.trending_score, b.trending_score))
        })
    }

    /// Published stories ordered by recency-weighted activity, hottest first.
    pub fn trending_stories(&self, window: MetricsWindow, limit: usize) -> AppResult<Vec<RankedStory>> {
        self.ranking(AggregateScope::Trending, window, limit, |a, b| {
            cmp_f64_desc(a.trending_score, b.trending_score)
                .then_with(|| b.performance.score.cmp(&a.performance.score))
        })
    }

    pub fn platform_overview(&self, window: MetricsWindow) -> AppResult<PlatformOverview> {
        let key = CacheKey::aggregate(AggregateScope::PlatformOverview, window, 0);
        if let Some(CachedValue::Overview(overview)) = self.try_get_cache(&key) {
            return Ok(overview);
        }

        let settings = self.settings.get()?;
        let reports = self.published_reports(&settings, window)?;

        let mut distribution = LevelDistribution::default();
        let mut score_sum = 0.0;
        let mut completion_sum = 0.0;
        let mut total_views = 0u64;
        for report in &reports {
            distribution.record(report.performance.level);
            score_sum += f64::from(report.performance.score);
            completion_sum += report.completion_rate;
            total_views += report.view_count;
        }

        let story_count = reports.len() as u64;
        let (average_score, average_completion_rate) = if story_count == 0 {
            (0.0, 0.0)
        } else {
            (
                round2(score_sum / story_count as f64),
                round2(completion_sum / story_count as f64),
            )
        };

        let overview = PlatformOverview {
            window,
            story_count,
            average_score,
            average_completion_rate,
            total_views,
            level_distribution: distribution,
            computed_at: Utc::now(),
        };

        self.insert_cache(
            key,
            CachedValue::Overview(overview.clone()),
            settings.aggregate_cache_ttl(),
        );
        Ok(overview)
    }

    fn story_report_with(
        &self,
        settings: &ScoringSettings,
        story_id: i64,
        window: MetricsWindow,
    ) -> AppResult<PerformanceReport> {
        let key = CacheKey::entity(EntityKind::Story, story_id, window);
        if let Some(CachedValue::Report(report)) = self.try_get_cache(&key) {
            return Ok(report);
        }

        let engine = ScoringEngine::from_settings(settings);
        let entity = EntityRef::story(story_id);
        let snapshot = self
            .collector
            .collect(&collect_request(settings, entity, window, Utc::now()))?;
        let report = engine.report(entity, window, &snapshot);

        debug!(
            target: "app::scoring",
            story_id,
            window = %window,
            score = report.performance.score,
            level = report.performance.level.as_str(),
            "computed story report"
        );

        self.insert_cache(key, CachedValue::Report(report.clone()), settings.cache_ttl());
        Ok(report)
    }

    fn published_reports(
        &self,
        settings: &ScoringSettings,
        window: MetricsWindow,
    ) -> AppResult<Vec<PerformanceReport>> {
        let mut reports = Vec::new();
        for story_id in self.collector.published_story_ids()? {
            match self.story_report_with(settings, story_id, window) {
                Ok(report) => reports.push(report),
                // removed between listing and collecting
                Err(AppError::NotFound) => {
                    warn!(target: "app::scoring", story_id, "story vanished while ranking");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(reports)
    }

    fn ranking<F>(
        &self,
        scope: AggregateScope,
        window: MetricsWindow,
        limit: usize,
        order: F,
    ) -> AppResult<Vec<RankedStory>>
    where
        F: Fn(&PerformanceReport, &PerformanceReport) -> Ordering,
    {
        ensure_valid_limit(limit)?;

        let key = CacheKey::aggregate(scope, window, limit);
        if let Some(CachedValue::Ranking(ranking)) = self.try_get_cache(&key) {
            return Ok(ranking);
        }

        let settings = self.settings.get()?;
        let mut reports = self.published_reports(&settings, window)?;
        reports.sort_by(|a, b| order(a, b).then_with(|| a.entity.id.cmp(&b.entity.id)));
        reports.truncate(limit);

        let ids: Vec<i64> = reports.iter().map(|report| report.entity.id).collect();
        let mut titles = self.collector.story_titles(&ids)?;

        let ranking: Vec<RankedStory> = reports
            .into_iter()
            .enumerate()
            .map(|(index, report)| RankedStory {
                rank: index + 1,
                story_id: report.entity.id,
                title: titles.remove(&report.entity.id).unwrap_or_default(),
                score: report.performance.score,
                level: report.performance.level,
                trending_score: report.trending_score,
                completion_rate: report.completion_rate,
            })
            .collect();

        debug!(
            target: "app::scoring",
            scope = scope.as_str(),
            window = %window,
            entries = ranking.len(),
            "computed story ranking"
        );

        self.insert_cache(
            key,
            CachedValue::Ranking(ranking.clone()),
            settings.aggregate_cache_ttl(),
        );
        Ok(ranking)
    }

    /// Cache failures degrade to a recompute rather than failing the read.
    fn try_get_cache(&self, key: &CacheKey) -> Option<CachedValue> {
        match self.cache.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "app::cache", cache_key = %key, error = %err, "cache read failed");
                None
            }
        }
    }

    fn insert_cache(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        if let Err(err) = self.cache.put(key, value, ttl) {
            warn!(target: "app::cache", cache_key = %key, error = %err, "cache write failed");
        }
    }
}

fn collect_request(
    settings: &ScoringSettings,
    entity: EntityRef,
    window: MetricsWindow,
    captured_at: DateTime<Utc>,
) -> CollectRequest {
    CollectRequest {
        entity,
        window,
        captured_at,
        trending_window_days: settings.trending_window_days,
        bounce_threshold_percent: settings.bounce_threshold_percent,
    }
}

fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

pub fn ensure_valid_limit(limit: usize) -> AppResult<()> {
    if limit == 0 || limit > MAX_RANKING_LIMIT {
        return Err(AppError::validation_with_details(
            format!("limit must be between 1 and {MAX_RANKING_LIMIT}"),
            serde_json::json!({ "field": "limit", "value": limit }),
        ));
    }
    Ok(())
}
