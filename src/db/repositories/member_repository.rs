use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::activity::MemberRecord;

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: i64,
    pub display_name: String,
    pub email: String,
    pub joined_at: String,
    pub created_at: String,
}

impl MemberRow {
    pub fn into_record(self) -> MemberRecord {
        MemberRecord {
            id: self.id,
            display_name: self.display_name,
            email: self.email,
            joined_at: self.joined_at,
            created_at: self.created_at,
        }
    }
}

impl TryFrom<&Row<'_>> for MemberRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            display_name: row.get("display_name")?,
            email: row.get("email")?,
            joined_at: row.get("joined_at")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub struct MemberRepository;

impl MemberRepository {
    pub fn insert(
        conn: &Connection,
        display_name: &str,
        email: &str,
        joined_at: &str,
    ) -> AppResult<MemberRecord> {
        conn.execute(
            r#"
                INSERT INTO members (display_name, email, joined_at, created_at)
                VALUES (:display_name, :email, :joined_at, :joined_at)
            "#,
            named_params! {
                ":display_name": display_name,
                ":email": email,
                ":joined_at": joined_at,
            },
        )?;

        let id = conn.last_insert_rowid();
        Self::find_by_id(conn, id)?.ok_or_else(AppError::not_found)
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> AppResult<Option<MemberRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, display_name, email, joined_at, created_at FROM members WHERE id = ?1",
        )?;

        let row = stmt
            .query_row([id], |row| MemberRow::try_from(row))
            .optional()?;

        Ok(row.map(MemberRow::into_record))
    }

    pub fn exists(conn: &Connection, id: i64) -> AppResult<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM members WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }
}
