use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::schema::{init_debug_table, validate_table_name};
use crate::{Error, Format, Record, Result, Storage, composite_key, matches_type};

pub const DEFAULT_TABLE: &str = "pop_debug";

/// One row of the debug table.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugRow {
    pub id: i64,
    pub key: String,
    pub handler: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub elapsed: Option<f64>,
    pub message: Option<String>,
    pub context: Option<String>,
}

/// SQL table backend: one row per (request id, handler key) with the timing
/// triple in its own columns.
///
/// Text-format data lands in `message`; other formats are encoded into
/// `context`.
pub struct DatabaseStorage {
    conn: Mutex<Connection>,
    table: String,
    format: Format,
}

impl DatabaseStorage {
    pub fn new(conn: Connection, table: &str, format: Format) -> Result<Self> {
        validate_table_name(table)?;
        init_debug_table(&conn, table)?;

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            format,
        })
    }

    pub fn open(db_path: &Path, format: Format) -> Result<Self> {
        Self::open_with_table(db_path, DEFAULT_TABLE, format)
    }

    pub fn open_with_table(db_path: &Path, table: &str, format: Format) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(|e| {
            Error::StorageUnavailable(format!(
                "failed to open database {}: {}",
                db_path.display(),
                e
            ))
        })?;
        Self::new(conn, table, format)
    }

    pub fn open_in_memory(format: Format) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::new(conn, DEFAULT_TABLE, format)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decode_columns(&self, message: Option<String>, context: Option<String>) -> Result<Value> {
        match context {
            Some(context) => self.format.decode(&context),
            None => Ok(Value::String(message.unwrap_or_default())),
        }
    }

    /// Raw rows for a request, in insertion order.
    pub fn rows(&self, id: &str) -> Result<Vec<DebugRow>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT id, "key", handler, start, "end", elapsed, message, context
            FROM "{}"
            WHERE "key" = ?1
            ORDER BY id
            "#,
            self.table
        ))?;

        let rows = stmt
            .query_map([id], |row| {
                Ok(DebugRow {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    handler: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                    elapsed: row.get(5)?,
                    message: row.get(6)?,
                    context: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        Ok(rows)
    }
}

impl Storage for DatabaseStorage {
    fn format(&self) -> Format {
        self.format
    }

    fn save(&self, id: &str, name: &str, record: &Record) -> Result<()> {
        let encoded = self.format.encode(&record.data)?;
        let (message, context) = if self.format.is_text() {
            (Some(encoded), None)
        } else {
            (None, Some(encoded))
        };

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            &format!(r#"DELETE FROM "{}" WHERE "key" = ?1 AND handler = ?2"#, self.table),
            params![id, name],
        )?;
        tx.execute(
            &format!(
                r#"
                INSERT INTO "{}" ("key", handler, start, "end", elapsed, message, context)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                self.table
            ),
            params![
                id,
                name,
                record.start,
                record.end,
                record.elapsed,
                message,
                context
            ],
        )?;
        tx.commit()?;

        tracing::debug!(table = %self.table, id, handler = name, "saved debug record");
        Ok(())
    }

    fn get_by_id(&self, id: &str, name: Option<&str>) -> Result<Option<Value>> {
        if let Some(name) = name {
            let columns = self
                .lock()
                .query_row(
                    &format!(
                        r#"
                        SELECT message, context
                        FROM "{}"
                        WHERE "key" = ?1 AND handler = ?2
                        ORDER BY id DESC
                        LIMIT 1
                        "#,
                        self.table
                    ),
                    params![id, name],
                    |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
                )
                .optional()?;

            return columns
                .map(|(message, context)| self.decode_columns(message, context))
                .transpose();
        }

        let mut map = Map::new();
        for row in self.rows(id)? {
            map.insert(row.handler, self.decode_columns(row.message, row.context)?);
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }

    fn get_by_type(&self, handler_type: &str) -> Result<Option<Value>> {
        let rows = {
            let conn = self.lock();
            let mut stmt = conn.prepare(&format!(
                r#"
                SELECT "key", handler, message, context
                FROM "{}"
                ORDER BY id
                "#,
                self.table
            ))?;
            stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?
        };

        let mut map = Map::new();
        for (key, handler, message, context) in rows {
            if matches_type(&handler, handler_type) {
                map.insert(
                    composite_key(&key, &handler),
                    self.decode_columns(message, context)?,
                );
            }
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }

    fn has(&self, id: &str, name: Option<&str>) -> Result<bool> {
        let conn = self.lock();
        let count: i64 = match name {
            Some(name) => conn.query_row(
                &format!(
                    r#"SELECT COUNT(*) FROM "{}" WHERE "key" = ?1 AND handler = ?2"#,
                    self.table
                ),
                params![id, name],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                &format!(r#"SELECT COUNT(*) FROM "{}" WHERE "key" = ?1"#, self.table),
                [id],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    fn delete(&self, id: &str, name: Option<&str>) -> Result<()> {
        let conn = self.lock();
        let removed = match name {
            Some(name) => conn.execute(
                &format!(
                    r#"DELETE FROM "{}" WHERE "key" = ?1 AND handler = ?2"#,
                    self.table
                ),
                params![id, name],
            )?,
            None => conn.execute(
                &format!(r#"DELETE FROM "{}" WHERE "key" = ?1"#, self.table),
                [id],
            )?,
        };
        tracing::debug!(table = %self.table, id, removed, "deleted debug records");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let removed = self
            .lock()
            .execute(&format!(r#"DELETE FROM "{}""#, self.table), [])?;
        tracing::debug!(table = %self.table, removed, "cleared debug table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_overwrites_same_key() {
        let storage = DatabaseStorage::open_in_memory(Format::Json).unwrap();
        storage
            .save("req", "time", &Record::new("time", json!({"elapsed": 1.0})))
            .unwrap();
        storage
            .save("req", "time", &Record::new("time", json!({"elapsed": 2.0})))
            .unwrap();

        let rows = storage.rows("req").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            storage.get_by_id("req", Some("time")).unwrap(),
            Some(json!({"elapsed": 2.0}))
        );
    }

    #[test]
    fn test_timing_columns_are_populated() {
        let storage = DatabaseStorage::open_in_memory(Format::Json).unwrap();
        let record = Record::new("time", json!({})).with_timing(Some(1.5), Some(4.0), Some(2.5));
        storage.save("req", "time", &record).unwrap();

        let row = &storage.rows("req").unwrap()[0];
        assert_eq!(row.start, Some(1.5));
        assert_eq!(row.end, Some(4.0));
        assert_eq!(row.elapsed, Some(2.5));
        assert!(row.message.is_none());
    }

    #[test]
    fn test_text_format_uses_message_column() {
        let storage = DatabaseStorage::open_in_memory(Format::Text).unwrap();
        storage
            .save("req", "message", &Record::new("message", json!("hello\n")))
            .unwrap();

        let row = &storage.rows("req").unwrap()[0];
        assert_eq!(row.message.as_deref(), Some("hello\n"));
        assert!(row.context.is_none());
        assert_eq!(
            storage.get_by_id("req", Some("message")).unwrap(),
            Some(json!("hello\n"))
        );
    }

    #[test]
    fn test_invalid_table_is_misconfiguration() {
        let conn = Connection::open_in_memory().unwrap();
        let err = DatabaseStorage::new(conn, "bad name", Format::Json).err().unwrap();
        assert!(matches!(err, Error::StorageMisconfigured(_)));
    }
}
