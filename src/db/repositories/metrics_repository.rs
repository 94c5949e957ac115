use rusqlite::{named_params, Connection};

use super::{owner_column, TimeBounds};
use crate::db::parse_timestamp;
use crate::error::AppResult;
use crate::models::metrics::{ActivityPoint, EntityKind};

/// Daily activity buckets feeding the trending score.
pub struct MetricsRepository;

impl MetricsRepository {
    pub fn daily_views(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
        bounds: &TimeBounds,
    ) -> AppResult<Vec<ActivityPoint>> {
        daily_points(conn, "story_views", "viewed_at", kind, id, bounds)
    }

    pub fn daily_ratings(
        conn: &Connection,
        kind: EntityKind,
        id: i64,
        bounds: &TimeBounds,
    ) -> AppResult<Vec<ActivityPoint>> {
        daily_points(conn, "ratings", "updated_at", kind, id, bounds)
    }
}

/// Groups rows by UTC day. Each bucket is stamped with its latest row so the
/// point never falls before the range start.
fn daily_points(
    conn: &Connection,
    table: &str,
    time_column: &str,
    kind: EntityKind,
    id: i64,
    bounds: &TimeBounds,
) -> AppResult<Vec<ActivityPoint>> {
    let sql = format!(
        r#"
            SELECT substr({time_column}, 1, 10) AS day,
                   MAX({time_column}) AS latest,
                   COUNT(*) AS total
            FROM {table}
            WHERE {column} = :id
              AND (:since IS NULL OR {time_column} >= :since)
              AND {time_column} <= :until
            GROUP BY day
            ORDER BY day ASC
        "#,
        column = owner_column(kind)
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            named_params! {
                ":id": id,
                ":since": bounds.since,
                ":until": bounds.until,
            },
            |row| Ok((row.get::<_, String>("latest")?, row.get::<_, i64>("total")?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(latest, total)| {
            Ok(ActivityPoint::new(
                parse_timestamp(&latest)?,
                total.max(0) as u64,
            ))
        })
        .collect()
}
