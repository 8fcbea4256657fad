use regex::Regex;
use rusqlite::Connection;

use crate::{Error, Result};

// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(table: &str) -> Result<()> {
    let pattern = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .map_err(|e| Error::StorageMisconfigured(e.to_string()))?;

    if pattern.is_match(table) {
        Ok(())
    } else {
        Err(Error::StorageMisconfigured(format!(
            "invalid table name '{}': use letters, digits and underscores",
            table
        )))
    }
}

/// Column layout of the database backend. Idempotent.
pub fn init_debug_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            "key" TEXT NOT NULL,
            handler TEXT NOT NULL,
            start REAL,
            "end" REAL,
            elapsed REAL,
            message TEXT,
            context TEXT
        );

        CREATE INDEX IF NOT EXISTS "idx_{table}_key" ON "{table}"("key");
        CREATE INDEX IF NOT EXISTS "idx_{table}_handler" ON "{table}"(handler);
        CREATE INDEX IF NOT EXISTS "idx_{table}_start" ON "{table}"(start);
        CREATE INDEX IF NOT EXISTS "idx_{table}_end" ON "{table}"("end");
        CREATE INDEX IF NOT EXISTS "idx_{table}_elapsed" ON "{table}"(elapsed);
        "#,
        table = table
    ))?;

    tracing::debug!(table, "debug table ready");
    Ok(())
}

/// Key/value layout of the embedded SQLite file backend. Idempotent.
pub fn init_entries_table(conn: &Connection, table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS "{table}" (
            "key" TEXT PRIMARY KEY,
            request_id TEXT NOT NULL,
            handler TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS "idx_{table}_request" ON "{table}"(request_id);
        CREATE INDEX IF NOT EXISTS "idx_{table}_handler" ON "{table}"(handler);
        "#,
        table = table
    ))?;

    tracing::debug!(table, "entries table ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("pop_debug").is_ok());
        assert!(validate_table_name("_t2").is_ok());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("debug; DROP TABLE x").is_err());
        assert!(validate_table_name("").is_err());
    }

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_debug_table(&conn, "pop_debug").unwrap();
        init_debug_table(&conn, "pop_debug").unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'pop_debug'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
