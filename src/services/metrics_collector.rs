use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::db::repositories::interaction_repository::InteractionRepository;
use crate::db::repositories::member_repository::MemberRepository;
use crate::db::repositories::metrics_repository::MetricsRepository;
use crate::db::repositories::rating_repository::RatingRepository;
use crate::db::repositories::reading_history_repository::ReadingHistoryRepository;
use crate::db::repositories::story_repository::StoryRepository;
use crate::db::repositories::TimeBounds;
use crate::db::{parse_timestamp, DbPool};
use crate::error::{AppError, AppResult};
use crate::models::activity::MemberRecord;
use crate::models::member::ReadingTotals;
use crate::models::metrics::{
    CollectRequest, EntityKind, MetricsSnapshot, MetricsWindow,
};
use crate::services::reading_milestones::words_read;

/// Source of raw counts for the scoring engine.
pub trait MetricsCollector: Send + Sync {
    /// Builds one snapshot for the requested entity. Every count comes from
    /// the same store state. Unknown entities yield `AppError::NotFound`.
    fn collect(&self, request: &CollectRequest) -> AppResult<MetricsSnapshot>;

    /// Published stories eligible for rankings and the platform overview.
    fn published_story_ids(&self) -> AppResult<Vec<i64>>;

    fn story_titles(&self, story_ids: &[i64]) -> AppResult<HashMap<i64, String>>;

    fn member(&self, member_id: i64) -> AppResult<MemberRecord>;

    fn reading_days(&self, member_id: i64) -> AppResult<Vec<NaiveDate>>;

    fn reading_totals(
        &self,
        member_id: i64,
        window: MetricsWindow,
        captured_at: DateTime<Utc>,
    ) -> AppResult<ReadingTotals>;
}

#[derive(Debug, Clone)]
pub struct SqliteMetricsCollector {
    db: DbPool,
}

impl SqliteMetricsCollector {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

impl MetricsCollector for SqliteMetricsCollector {
    fn collect(&self, request: &CollectRequest) -> AppResult<MetricsSnapshot> {
        // A read transaction pins one WAL snapshot for every query below.
        let snapshot = self.db.with_transaction(|tx| match request.entity.kind {
            EntityKind::Story => collect_story(tx, request),
            EntityKind::Member => collect_member(tx, request),
        })?;

        debug!(
            target: "app::collector",
            entity_type = %request.entity.kind,
            entity_id = request.entity.id,
            window = %request.window,
            views = snapshot.view_count,
            readers = snapshot.total_readers,
            ratings = snapshot.total_ratings,
            "collected metrics snapshot"
        );

        Ok(snapshot)
    }

    fn published_story_ids(&self) -> AppResult<Vec<i64>> {
        self.db.with_connection(StoryRepository::list_published_ids)
    }

    fn story_titles(&self, story_ids: &[i64]) -> AppResult<HashMap<i64, String>> {
        self.db.with_connection(|conn| {
            Ok(StoryRepository::titles(conn, story_ids)?
                .into_iter()
                .collect())
        })
    }

    fn member(&self, member_id: i64) -> AppResult<MemberRecord> {
        self.db.with_connection(|conn| {
            MemberRepository::find_by_id(conn, member_id)?.ok_or_else(AppError::not_found)
        })
    }

    fn reading_days(&self, member_id: i64) -> AppResult<Vec<NaiveDate>> {
        self.db
            .with_connection(|conn| ReadingHistoryRepository::reading_days(conn, member_id))
    }

    fn reading_totals(
        &self,
        member_id: i64,
        window: MetricsWindow,
        captured_at: DateTime<Utc>,
    ) -> AppResult<ReadingTotals> {
        let bounds = TimeBounds::for_window(window, captured_at);
        self.db.with_transaction(|tx| {
            if !MemberRepository::exists(tx, member_id)? {
                return Err(AppError::not_found());
            }
            // The bounce threshold does not affect started/completed counts.
            let readers =
                ReadingHistoryRepository::reader_counts(tx, EntityKind::Member, member_id, &bounds, 0.0)?;
            let ratings = RatingRepository::stats(tx, EntityKind::Member, member_id, &bounds)?;
            let words = total_words_read(tx, member_id, &bounds)?;

            Ok(ReadingTotals {
                words_read: words,
                stories_started: readers.total,
                stories_completed: readers.completed,
                ratings_given: ratings.total,
            })
        })
    }
}

fn trending_bounds(request: &CollectRequest) -> TimeBounds {
    let start = request.captured_at - Duration::days(i64::from(request.trending_window_days));
    TimeBounds::between(start, request.captured_at)
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    (later - earlier).num_days().max(0) as u64
}

fn total_words_read(conn: &Connection, member_id: i64, bounds: &TimeBounds) -> AppResult<u64> {
    let rows = ReadingHistoryRepository::member_progress(conn, member_id, bounds)?;
    Ok(rows
        .iter()
        .map(|row| words_read(row.word_count, row.reading_progress))
        .sum())
}

fn collect_story(conn: &Connection, request: &CollectRequest) -> AppResult<MetricsSnapshot> {
    let story_id = request.entity.id;
    let story = StoryRepository::find_by_id(conn, story_id)?.ok_or_else(AppError::not_found)?;
    let bounds = TimeBounds::for_window(request.window, request.captured_at);
    let recent = trending_bounds(request);

    let view_count = InteractionRepository::count_views(conn, EntityKind::Story, story_id, &bounds)?;
    let readers = ReadingHistoryRepository::reader_counts(
        conn,
        EntityKind::Story,
        story_id,
        &bounds,
        request.bounce_threshold_percent,
    )?;
    let ratings = RatingRepository::stats(conn, EntityKind::Story, story_id, &bounds)?;
    let interactions =
        InteractionRepository::count_interactions(conn, EntityKind::Story, story_id, &bounds)?;

    let published_at = parse_timestamp(story.published_at.as_deref().unwrap_or(&story.created_at))?;

    Ok(MetricsSnapshot {
        view_count,
        total_readers: readers.total,
        completed_readers: readers.completed,
        average_rating: ratings.average,
        total_ratings: ratings.total,
        word_count: story.word_count,
        days_since_published: days_between(published_at, request.captured_at),
        recent_view_counts: MetricsRepository::daily_views(conn, EntityKind::Story, story_id, &recent)?,
        recent_rating_counts: MetricsRepository::daily_ratings(
            conn,
            EntityKind::Story,
            story_id,
            &recent,
        )?,
        bookmark_count: interactions.bookmarks,
        share_count: interactions.shares,
        short_sessions: readers.short_sessions,
        captured_at: request.captured_at,
    })
}

/// Member snapshots reuse the story fields from the reader's side: views made,
/// stories started and completed, ratings given, words read, and days since the
/// last reading activity (or since joining when there is none).
fn collect_member(conn: &Connection, request: &CollectRequest) -> AppResult<MetricsSnapshot> {
    let member_id = request.entity.id;
    let member = MemberRepository::find_by_id(conn, member_id)?.ok_or_else(AppError::not_found)?;
    let bounds = TimeBounds::for_window(request.window, request.captured_at);
    let recent = trending_bounds(request);

    let view_count =
        InteractionRepository::count_views(conn, EntityKind::Member, member_id, &bounds)?;
    let readers = ReadingHistoryRepository::reader_counts(
        conn,
        EntityKind::Member,
        member_id,
        &bounds,
        request.bounce_threshold_percent,
    )?;
    let ratings = RatingRepository::stats(conn, EntityKind::Member, member_id, &bounds)?;
    let interactions =
        InteractionRepository::count_interactions(conn, EntityKind::Member, member_id, &bounds)?;

    let last_active = match ReadingHistoryRepository::last_read_at(conn, member_id)? {
        Some(value) => parse_timestamp(&value)?,
        None => parse_timestamp(&member.joined_at)?,
    };

    Ok(MetricsSnapshot {
        view_count,
        total_readers: readers.total,
        completed_readers: readers.completed,
        average_rating: ratings.average,
        total_ratings: ratings.total,
        word_count: total_words_read(conn, member_id, &bounds)?,
        days_since_published: days_between(last_active, request.captured_at),
        recent_view_counts: MetricsRepository::daily_views(
            conn,
            EntityKind::Member,
            member_id,
            &recent,
        )?,
        recent_rating_counts: MetricsRepository::daily_ratings(
            conn,
            EntityKind::Member,
            member_id,
            &recent,
        )?,
        bookmark_count: interactions.bookmarks,
        share_count: interactions.shares,
        short_sessions: readers.short_sessions,
        captured_at: request.captured_at,
    })
}
