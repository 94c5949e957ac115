use rusqlite::{named_params, Connection};

use super::{owner_column, TimeBounds};
use crate::error::AppResult;
use crate::models::activity::InteractionKind;
use crate::models::metrics::EntityKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionCounts {
    pub bookmarks: u64,
    pub shares: u64,
}

/// Append-only activity: story views plus bookmarks and shares.
pub struct InteractionRepository;

impl InteractionRepository {
    pub fn record_view(
        conn: &Connection,
        story_id: i64,
        member_id: Option<i64>,
        viewed_at: &str,
    ) -> AppResult<i64> {
        conn.execute(
            r#"
                INSERT INTO story_views (story_id, member_id, viewed_at)
                VALUES (:story_id, :member_id, :viewed_at)
            "#,
            named_params! {
                ":story_id": story_id,
                ":member_id": member_id,
                ":viewed_at": viewed_at,
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn record_interaction(
        conn: &Connection,
        story_id: i64,
        member_id: Option<i64>,
        kind: InteractionKind,
        created_at: &str,
    ) -> AppResult<i64> {
        conn.execute(
            r#"
                INSERT INTO story_interactions (story_id, member_id, kind, created_at)
                VALUES (:story_id, :member_id, :kind, :created_at)
            "#,
            named_params! {
                ":story_id": story_id,
                ":member_id": member_id,
                ":kind": kind.as_str(),
                ":created_at": created_at,
            },
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_views(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
        bounds: &TimeBounds,
    ) -> AppResult<u64> {
        let sql = format!(
            r#"
                SELECT COUNT(*) FROM story_views
                WHERE {column} = :id
                  AND (:since IS NULL OR viewed_at >= :since)
                  AND viewed_at <= :until
            "#,
            column = owner_column(kind)
        );

        let count: i64 = conn.query_row(
            &sql,
            named_params! {
                ":id": id,
                ":since": bounds.since,
                ":until": bounds.until,
            },
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u64)
    }

    pub fn count_interactions(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
        bounds: &TimeBounds,
    ) -> AppResult<InteractionCounts> {
        let sql = format!(
            r#"
                SELECT
                    COALESCE(SUM(CASE WHEN kind = 'bookmark' THEN 1 ELSE 0 END), 0) AS bookmarks,
                    COALESCE(SUM(CASE WHEN kind = 'share' THEN 1 ELSE 0 END), 0) AS shares
                FROM story_interactions
                WHERE {column} = :id
                  AND (:since IS NULL OR created_at >= :since)
                  AND created_at <= :until
            "#,
            column = owner_column(kind)
        );

        let counts = conn.query_row(
            &sql,
            named_params! {
                ":id": id,
                ":since": bounds.since,
                ":until": bounds.until,
            },
            |row| {
                Ok(InteractionCounts {
                    bookmarks: row.get::<_, i64>("bookmarks")?.max(0) as u64,
                    shares: row.get::<_, i64>("shares")?.max(0) as u64,
                })
            },
        )?;

        Ok(counts)
    }
}
