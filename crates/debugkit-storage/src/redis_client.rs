use redis::Commands;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Error, KeyValueClient, Result};

/// Redis-backed client for [`crate::KeyValueStorage`].
pub struct RedisClient {
    conn: Mutex<redis::Connection>,
}

impl RedisClient {
    /// Connects and pings the server so an unreachable store fails here.
    pub fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::StorageMisconfigured(format!("invalid redis url '{}': {}", url, e)))?;
        let mut conn = client
            .get_connection()
            .map_err(|e| Error::StorageUnavailable(format!("cannot connect to {}: {}", url, e)))?;
        redis::cmd("PING")
            .query::<String>(&mut conn)
            .map_err(|e| Error::StorageUnavailable(format!("{} did not answer PING: {}", url, e)))?;

        tracing::debug!(url, "connected to redis");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, redis::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn kv_error(err: redis::RedisError) -> Error {
    Error::KeyValue(err.to_string())
}

/// Escape glob metacharacters so a prefix matches literally in `KEYS`.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

impl KeyValueClient for RedisClient {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.lock().get(key).map_err(kv_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().set::<_, _, ()>(key, value).map_err(kv_error)
    }

    fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.lock().del::<_, ()>(keys).map_err(kv_error)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .lock()
            .keys(escape_pattern(prefix))
            .map_err(kv_error)?;
        keys.sort();
        Ok(keys)
    }

    fn flush_all(&self) -> Result<()> {
        redis::cmd("FLUSHDB")
            .query::<()>(&mut *self.lock())
            .map_err(kv_error)
    }
}
