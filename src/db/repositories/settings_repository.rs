use std::convert::TryFrom;

use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for SettingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Key/value overrides in `app_settings`. Keys are namespaced, e.g.
/// `scoring.cacheTtlSeconds`.
pub struct SettingsRepository;

impl SettingsRepository {
    pub fn get(conn: &Connection, key: &str) -> AppResult<Option<SettingRow>> {
        let row = conn
            .query_row(
                "SELECT key, value, updated_at FROM app_settings WHERE key = ?1",
                [key],
                |row| SettingRow::try_from(row),
            )
            .optional()?;

        Ok(row)
    }

    pub fn list_namespace(conn: &Connection, namespace: &str) -> AppResult<Vec<SettingRow>> {
        let mut stmt = conn.prepare(
            r#"
                SELECT key, value, updated_at
                FROM app_settings
                WHERE substr(key, 1, length(:prefix)) = :prefix
                ORDER BY key ASC
            "#,
        )?;

        let prefix = format!("{namespace}.");
        let rows = stmt
            .query_map(named_params! {":prefix": prefix}, |row| SettingRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn upsert(conn: &Connection, key: &str, value: &str, updated_at: &str) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO app_settings (key, value, updated_at)
                VALUES (:key, :value, :updated_at)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
            "#,
            named_params! {
                ":key": key,
                ":value": value,
                ":updated_at": updated_at,
            },
        )?;

        Ok(())
    }

    pub fn delete_namespace(conn: &Connection, namespace: &str) -> AppResult<usize> {
        let prefix = format!("{namespace}.");
        let deleted = conn.execute(
            "DELETE FROM app_settings WHERE substr(key, 1, length(?1)) = ?1",
            [prefix],
        )?;
        Ok(deleted)
    }
}
