use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::schema::{init_entries_table, validate_table_name};
use crate::{Error, Format, Record, Result, Storage, composite_key, matches_type};

pub const DEFAULT_ENTRIES_TABLE: &str = "debug_entries";

/// Embedded SQLite file holding one encoded value per composite key.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    path: PathBuf,
    table: String,
    format: Format,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>, format: Format) -> Result<Self> {
        Self::open_with_table(path, DEFAULT_ENTRIES_TABLE, format)
    }

    pub fn open_with_table(path: impl AsRef<Path>, table: &str, format: Format) -> Result<Self> {
        let path = path.as_ref();
        validate_table_name(table)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return Err(Error::StorageUnavailable(format!(
                "directory {} does not exist",
                parent.display()
            )));
        }

        let conn = Connection::open(path).map_err(|e| {
            Error::StorageUnavailable(format!("failed to open {}: {}", path.display(), e))
        })?;
        init_entries_table(&conn, table)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            table: table.to_string(),
            format,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select_pairs(&self, sql: &str, id: Option<&str>) -> Result<Vec<(String, String, String)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, String)> {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        };

        let rows = match id {
            Some(id) => stmt
                .query_map([id], map_row)?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?,
        };
        Ok(rows)
    }
}

impl Storage for SqliteStorage {
    fn format(&self) -> Format {
        self.format
    }

    fn save(&self, id: &str, name: &str, record: &Record) -> Result<()> {
        let encoded = self.format.encode(&record.data)?;
        let key = composite_key(id, name);

        self.lock().execute(
            &format!(
                r#"
                INSERT INTO "{}" ("key", request_id, handler, value, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT("key") DO UPDATE SET
                    value = excluded.value,
                    created_at = excluded.created_at
                "#,
                self.table
            ),
            params![key, id, name, encoded, Utc::now().to_rfc3339()],
        )?;

        tracing::debug!(path = %self.path.display(), key = %key, "saved debug entry");
        Ok(())
    }

    fn get_by_id(&self, id: &str, name: Option<&str>) -> Result<Option<Value>> {
        if let Some(name) = name {
            let raw: Option<String> = self
                .lock()
                .query_row(
                    &format!(r#"SELECT value FROM "{}" WHERE "key" = ?1"#, self.table),
                    [composite_key(id, name)],
                    |row| row.get(0),
                )
                .optional()?;
            return raw.map(|raw| self.format.decode(&raw)).transpose();
        }

        let rows = self.select_pairs(
            &format!(
                r#"SELECT "key", handler, value FROM "{}" WHERE request_id = ?1 ORDER BY rowid"#,
                self.table
            ),
            Some(id),
        )?;

        let mut map = Map::new();
        for (_, handler, raw) in rows {
            map.insert(handler, self.format.decode(&raw)?);
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }

    fn get_by_type(&self, handler_type: &str) -> Result<Option<Value>> {
        let rows = self.select_pairs(
            &format!(
                r#"SELECT "key", handler, value FROM "{}" ORDER BY rowid"#,
                self.table
            ),
            None,
        )?;

        let mut map = Map::new();
        for (key, handler, raw) in rows {
            if matches_type(&handler, handler_type) {
                map.insert(key, self.format.decode(&raw)?);
            }
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }

    fn has(&self, id: &str, name: Option<&str>) -> Result<bool> {
        let conn = self.lock();
        let count: i64 = match name {
            Some(name) => conn.query_row(
                &format!(r#"SELECT COUNT(*) FROM "{}" WHERE "key" = ?1"#, self.table),
                [composite_key(id, name)],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                &format!(
                    r#"SELECT COUNT(*) FROM "{}" WHERE request_id = ?1"#,
                    self.table
                ),
                [id],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    fn delete(&self, id: &str, name: Option<&str>) -> Result<()> {
        let conn = self.lock();
        match name {
            Some(name) => conn.execute(
                &format!(r#"DELETE FROM "{}" WHERE "key" = ?1"#, self.table),
                [composite_key(id, name)],
            )?,
            None => conn.execute(
                &format!(r#"DELETE FROM "{}" WHERE request_id = ?1"#, self.table),
                [id],
            )?,
        };
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self
            .lock()
            .execute(&format!(r#"DELETE FROM "{}""#, self.table), [])?;
        tracing::debug!(path = %self.path.display(), removed, "cleared debug entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory_fails_at_open() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("debug.sqlite");

        let err = SqliteStorage::open(&path, Format::Json).err().unwrap();
        assert!(matches!(err, Error::StorageUnavailable(_)));
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("debug.sqlite");

        {
            let storage = SqliteStorage::open(&path, Format::Binary).unwrap();
            storage
                .save("req", "message", &Record::new("message", serde_json::json!([1, 2])))
                .unwrap();
        }

        let storage = SqliteStorage::open(&path, Format::Binary).unwrap();
        assert!(storage.has("req", Some("message")).unwrap());
        assert_eq!(
            storage.get_by_id("req", Some("message")).unwrap(),
            Some(serde_json::json!([1, 2]))
        );
    }
}
