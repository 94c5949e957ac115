use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use super::{owner_column, TimeBounds};
use crate::error::{AppError, AppResult};
use crate::models::activity::RatingRecord;
use crate::models::metrics::EntityKind;

#[derive(Debug, Clone)]
pub struct RatingRow {
    pub id: i64,
    pub story_id: i64,
    pub member_id: i64,
    pub rating: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl RatingRow {
    pub fn into_record(self) -> RatingRecord {
        RatingRecord {
            id: self.id,
            story_id: self.story_id,
            member_id: self.member_id,
            rating: self.rating.clamp(0, u8::MAX as i64) as u8,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl TryFrom<&Row<'_>> for RatingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            story_id: row.get("story_id")?,
            member_id: row.get("member_id")?,
            rating: row.get("rating")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Count and mean of the ratings inside a time range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingStats {
    pub total: u64,
    pub average: f64,
}

pub struct RatingRepository;

impl RatingRepository {
    pub fn find(conn: &Connection, story_id: i64, member_id: i64) -> AppResult<Option<RatingRecord>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT id, story_id, member_id, rating, created_at, updated_at
                FROM ratings
                WHERE story_id = ?1 AND member_id = ?2
            "#,
        )?;

        let row = stmt
            .query_row([story_id, member_id], |row| RatingRow::try_from(row))
            .optional()?;

        Ok(row.map(RatingRow::into_record))
    }

    /// Inserts or replaces a member's rating. The flag is `true` when a new
    /// row was created.
    pub fn upsert(
        conn: &Connection,
        story_id: i64,
        member_id: i64,
        rating: u8,
        now: &str,
    ) -> AppResult<(RatingRecord, bool)> {
        let created = Self::find(conn, story_id, member_id)?.is_none();

        conn.execute(
            r#"
                INSERT INTO ratings (story_id, member_id, rating, created_at, updated_at)
                VALUES (:story_id, :member_id, :rating, :now, :now)
                ON CONFLICT(story_id, member_id) DO UPDATE SET
                    rating = excluded.rating,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":story_id": story_id,
                ":member_id": member_id,
                ":rating": rating as i64,
                ":now": now,
            },
        )?;

        let record = Self::find(conn, story_id, member_id)?.ok_or_else(AppError::not_found)?;
        Ok((record, created))
    }

    pub fn delete(conn: &Connection, story_id: i64, member_id: i64) -> AppResult<bool> {
        let deleted = conn.execute(
            "DELETE FROM ratings WHERE story_id = ?1 AND member_id = ?2",
            [story_id, member_id],
        )?;
        Ok(deleted > 0)
    }

    pub fn stats(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
        bounds: &TimeBounds,
    ) -> AppResult<RatingStats> {
        let sql = format!(
            r#"
                SELECT COUNT(*) AS total, COALESCE(AVG(rating), 0.0) AS average
                FROM ratings
                WHERE {column} = :id
                  AND (:since IS NULL OR updated_at >= :since)
                  AND updated_at <= :until
            "#,
            column = owner_column(kind)
        );

        let stats = conn.query_row(
            &sql,
            named_params! {
                ":id": id,
                ":since": bounds.since,
                ":until": bounds.until,
            },
            |row| {
                Ok(RatingStats {
                    total: row.get::<_, i64>("total")?.max(0) as u64,
                    average: row.get("average")?,
                })
            },
        )?;

        Ok(stats)
    }
}
