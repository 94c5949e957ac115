use std::collections::BTreeSet;
use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use super::{owner_column, TimeBounds};
use crate::error::{AppError, AppResult};
use crate::models::activity::ReadingHistoryRecord;
use crate::models::metrics::EntityKind;

#[derive(Debug, Clone)]
pub struct ReadingHistoryRow {
    pub id: i64,
    pub story_id: i64,
    pub member_id: i64,
    pub reading_progress: f64,
    pub started_at: String,
    pub last_read_at: String,
    pub completed_at: Option<String>,
}

impl ReadingHistoryRow {
    pub fn into_record(self) -> ReadingHistoryRecord {
        ReadingHistoryRecord {
            id: self.id,
            story_id: self.story_id,
            member_id: self.member_id,
            reading_progress: self.reading_progress,
            started_at: self.started_at,
            last_read_at: self.last_read_at,
            completed_at: self.completed_at,
        }
    }
}

impl TryFrom<&Row<'_>> for ReadingHistoryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            story_id: row.get("story_id")?,
            member_id: row.get("member_id")?,
            reading_progress: row.get("reading_progress")?,
            started_at: row.get("started_at")?,
            last_read_at: row.get("last_read_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Reader counts for reading sessions started inside a time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderCounts {
    pub total: u64,
    pub completed: u64,
    pub short_sessions: u64,
}

/// One reading-history row joined with the story length, for word totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadProgress {
    pub word_count: u64,
    pub reading_progress: f64,
    pub completed: bool,
}

pub struct ReadingHistoryRepository;

impl ReadingHistoryRepository {
    pub fn find(
        conn: &Connection,
        story_id: i64,
        member_id: i64,
    ) -> AppResult<Option<ReadingHistoryRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, story_id, member_id, reading_progress, started_at, last_read_at, completed_at
                FROM reading_history
                WHERE story_id = ?1 AND member_id = ?2
            "#,
        )?;

        let row = stmt
            .query_row([story_id, member_id], |row| ReadingHistoryRow::try_from(row))
            .optional()?;

        Ok(row.map(ReadingHistoryRow::into_record))
    }

    /// Records the latest progress. `completed_at` is stamped the first time
    /// progress reaches 100 and is never cleared afterwards. A backfilled
    /// write never moves `last_read_at` backwards.
    pub fn upsert_progress(
        conn: &Connection,
        story_id: i64,
        member_id: i64,
        reading_progress: f64,
        now: &str,
    ) -> AppResult<ReadingHistoryRecord> {
        conn.execute(
            r#"
                INSERT INTO reading_history (
                    story_id,
                    member_id,
                    reading_progress,
                    started_at,
                    last_read_at,
                    completed_at
                ) VALUES (
                    :story_id,
                    :member_id,
                    :progress,
                    :now,
                    :now,
                    CASE WHEN :progress >= 100 THEN :now ELSE NULL END
                )
                ON CONFLICT(story_id, member_id) DO UPDATE SET
                    reading_progress = excluded.reading_progress,
                    started_at = MIN(reading_history.started_at, excluded.started_at),
                    last_read_at = MAX(reading_history.last_read_at, excluded.last_read_at),
                    completed_at = COALESCE(reading_history.completed_at, excluded.completed_at)
            "#,
            named_params! {
                ":story_id": story_id,
                ":member_id": member_id,
                ":progress": reading_progress,
                ":now": now,
            },
        )?;

        Self::find(conn, story_id, member_id)?.ok_or_else(AppError::not_found)
    }

    pub fn reader_counts(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
        bounds: &TimeBounds,
        bounce_threshold_percent: f64,
    ) -> AppResult<ReaderCounts> {
        let sql = format!(
            r#"
                SELECT
                    COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN completed_at IS NOT NULL THEN 1 ELSE 0 END), 0) AS completed,
                    COALESCE(SUM(CASE WHEN reading_progress < :threshold THEN 1 ELSE 0 END), 0) AS short_sessions
                FROM reading_history
                WHERE {column} = :id
                  AND (:since IS NULL OR started_at >= :since)
                  AND started_at <= :until
            "#,
            column = owner_column(kind)
        );

        let counts = conn.query_row(
            &sql,
            named_params! {
                ":id": id,
                ":threshold": bounce_threshold_percent,
                ":since": bounds.since,
                ":until": bounds.until,
            },
            |row| {
                Ok(ReaderCounts {
                    total: row.get::<_, i64>("total")?.max(0) as u64,
                    completed: row.get::<_, i64>("completed")?.max(0) as u64,
                    short_sessions: row.get::<_, i64>("short_sessions")?.max(0) as u64,
                })
            },
        )?;

        Ok(counts)
    }

    /// Rows a member touched inside the range, with each story's length.
    pub fn member_progress(
        conn: &Connection,
        member_id: i64,
        bounds: &TimeBounds,
    ) -> AppResult<Vec<ReadProgress>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT s.word_count AS word_count,
                       rh.reading_progress AS reading_progress,
                       rh.completed_at IS NOT NULL AS completed
                FROM reading_history rh
                INNER JOIN stories s ON s.id = rh.story_id
                WHERE rh.member_id = :member_id
                  AND (:since IS NULL OR rh.last_read_at >= :since)
                  AND rh.last_read_at <= :until
                ORDER BY rh.id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(
                named_params! {
                    ":member_id": member_id,
                    ":since": bounds.since,
                    ":until": bounds.until,
                },
                |row| {
                    Ok(ReadProgress {
                        word_count: row.get::<_, i64>("word_count")?.max(0) as u64,
                        reading_progress: row.get("reading_progress")?,
                        completed: row.get("completed")?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn last_read_at(conn: &Connection, member_id: i64) -> AppResult<Option<String>> {
        let latest = conn.query_row(
            "SELECT MAX(last_read_at) FROM reading_history WHERE member_id = ?1",
            [member_id],
            |row| row.get::<_, Option<String>>(0),
        )?;
        Ok(latest)
    }

    /// Distinct UTC calendar days on which the member started, continued or
    /// finished a story, in ascending order.
    pub fn reading_days(conn: &Connection, member_id: i64) -> AppResult<Vec<NaiveDate>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT substr(started_at, 1, 10) AS day FROM reading_history WHERE member_id = :member_id
                UNION
                SELECT substr(last_read_at, 1, 10) FROM reading_history WHERE member_id = :member_id
                UNION
                SELECT substr(completed_at, 1, 10) FROM reading_history
                WHERE member_id = :member_id AND completed_at IS NOT NULL
            "#,
        )?;

        let raw = stmt
            .query_map(named_params! {":member_id": member_id}, |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut days = BTreeSet::new();
        for value in raw {
            let day = NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|err| {
                AppError::database(format!("invalid reading day '{value}': {err}"))
            })?;
            days.insert(day);
        }

        Ok(days.into_iter().collect())
    }
}
