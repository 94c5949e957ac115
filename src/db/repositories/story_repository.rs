use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::activity::{StoryRecord, StoryStatus};

#[derive(Debug, Clone)]
pub struct StoryRow {
    pub id: i64,
    pub title: String,
    pub author_id: Option<i64>,
    pub word_count: i64,
    pub status: String,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl StoryRow {
    pub fn into_record(self) -> AppResult<StoryRecord> {
        Ok(StoryRecord {
            id: self.id,
            title: self.title,
            author_id: self.author_id,
            word_count: self.word_count.max(0) as u64,
            status: self.status.parse()?,
            published_at: self.published_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for StoryRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            author_id: row.get("author_id")?,
            word_count: row.get("word_count")?,
            status: row.get("status")?,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

const STORY_COLUMNS: &str =
    "id, title, author_id, word_count, status, published_at, created_at, updated_at";

pub struct StoryRepository;

impl StoryRepository {
    pub fn insert(
        conn: &Connection,
        title: &str,
        author_id: Option<i64>,
        word_count: i64,
        status: StoryStatus,
        published_at: Option<&str>,
        now: &str,
    ) -> AppResult<StoryRecord> {
        conn.execute(
            r#"
                INSERT INTO stories (
                    title,
                    author_id,
                    word_count,
                    status,
                    published_at,
                    created_at,
                    updated_at
                ) VALUES (
                    :title,
                    :author_id,
                    :word_count,
                    :status,
                    :published_at,
                    :now,
                    :now
                )
            "#,
            named_params! {
                ":title": title,
                ":author_id": author_id,
                ":word_count": word_count,
                ":status": status.as_str(),
                ":published_at": published_at,
                ":now": now,
            },
        )?;

        let id = conn.last_insert_rowid();
        Self::find_by_id(conn, id)?.ok_or_else(AppError::not_found)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<StoryRecord>> {
        let sql = format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;

        let row = stmt
            .query_row([id], |row| StoryRow::try_from(row))
            .optional()?;

        row.map(StoryRow::into_record).transpose()
    }

    /// Moves a story to `published`, keeping an earlier publish time if one exists.
    pub fn publish(conn: &Connection, id: i64, now: &str) -> AppResult<StoryRecord> {
        let updated = conn.execute(
            r#"
                UPDATE stories
                SET status = 'published',
                    published_at = COALESCE(published_at, :now),
                    updated_at = :now
                WHERE id = :id
            "#,
            named_params! {":id": id, ":now": now},
        )?;
        if updated == 0 {
            return Err(AppError::not_found());
        }

        Self::find_by_id(conn, id)?.ok_or_else(AppError::not_found)
    }

    pub fn update_details(
        conn: &Connection,
        id: i64,
        title: Option<&str>,
        word_count: Option<i64>,
        now: &str,
    ) -> AppResult<StoryRecord> {
        let updated = conn.execute(
            r#"
                UPDATE stories
                SET title = COALESCE(:title, title),
                    word_count = COALESCE(:word_count, word_count),
                    updated_at = :now
                WHERE id = :id
            "#,
            named_params! {
                ":id": id,
                ":title": title,
                ":word_count": word_count,
                ":now": now,
            },
        )?;
        if updated == 0 {
            return Err(AppError::not_found());
        }

        Self::find_by_id(conn, id)?.ok_or_else(AppError::not_found)
    }

    pub fn list_published_ids(conn: &Connection) -> AppResult<Vec<i64>> {
        let mut stmt =
            conn.prepare("SELECT id FROM stories WHERE status = 'published' ORDER BY id ASC")?;

        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    pub fn titles(conn: &Connection, ids: &[i64]) -> AppResult<Vec<(i64, String)>> {
        let mut stmt = conn.prepare("SELECT title FROM stories WHERE id = ?1")?;
        let mut titles = Vec::with_capacity(ids.len());
        for id in ids {
            let title: Option<String> = stmt.query_row([id], |row| row.get(0)).optional()?;
            if let Some(title) = title {
                titles.push((*id, title));
            }
        }
        Ok(titles)
    }
}
