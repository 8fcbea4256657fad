use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Format, Record, Result, Storage, composite_key, matches_type};

/// Minimal key-value client surface the key-value backend needs.
pub trait KeyValueClient: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn delete(&self, keys: &[String]) -> Result<()>;

    /// Every key starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Drop every key in the database, not only ours
    fn flush_all(&self) -> Result<()>;
}

/// In-process client backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryClient {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl KeyValueClient for MemoryClient {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn flush_all(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

/// Key-value backend: one key `<prefix><id>-<name>` per record.
///
/// `clear` only removes keys under the prefix; `flush_all` wipes the whole
/// database.
pub struct KeyValueStorage<C: KeyValueClient> {
    client: C,
    prefix: String,
    format: Format,
}

impl<C: KeyValueClient> KeyValueStorage<C> {
    pub const DEFAULT_PREFIX: &'static str = "debugkit:";

    pub fn new(client: C, format: Format) -> Self {
        Self::with_prefix(client, Self::DEFAULT_PREFIX, format)
    }

    pub fn with_prefix(client: C, prefix: impl Into<String>, format: Format) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            format,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn flush_all(&self) -> Result<()> {
        tracing::debug!("flushing entire key-value database");
        self.client.flush_all()
    }

    fn key(&self, id: &str, name: &str) -> String {
        format!("{}{}", self.prefix, composite_key(id, name))
    }

    fn id_prefix(&self, id: &str) -> String {
        format!("{}{}-", self.prefix, id)
    }

    fn collect(&self, keys: Vec<String>, strip: &str) -> Result<Option<Value>> {
        let mut map = Map::new();
        for key in keys {
            if let Some(raw) = self.client.get(&key)? {
                let short = key.strip_prefix(strip).unwrap_or(&key).to_string();
                map.insert(short, self.format.decode(&raw)?);
            }
        }
        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }
}

impl<C: KeyValueClient> Storage for KeyValueStorage<C> {
    fn format(&self) -> Format {
        self.format
    }

    fn save(&self, id: &str, name: &str, record: &Record) -> Result<()> {
        let key = self.key(id, name);
        let encoded = self.format.encode(&record.data)?;
        self.client.set(&key, &encoded)?;
        tracing::debug!(key = %key, "saved debug record");
        Ok(())
    }

    fn get_by_id(&self, id: &str, name: Option<&str>) -> Result<Option<Value>> {
        match name {
            Some(name) => self
                .client
                .get(&self.key(id, name))?
                .map(|raw| self.format.decode(&raw))
                .transpose(),
            None => {
                let prefix = self.id_prefix(id);
                let keys = self.client.keys_with_prefix(&prefix)?;
                self.collect(keys, &prefix)
            }
        }
    }

    fn get_by_type(&self, handler_type: &str) -> Result<Option<Value>> {
        let keys = self
            .client
            .keys_with_prefix(&self.prefix)?
            .into_iter()
            .filter(|key| {
                key.strip_prefix(self.prefix.as_str())
                    .and_then(|rest| rest.split_once('-'))
                    .is_some_and(|(_, name)| matches_type(name, handler_type))
            })
            .collect();
        self.collect(keys, &self.prefix)
    }

    fn has(&self, id: &str, name: Option<&str>) -> Result<bool> {
        match name {
            Some(name) => Ok(self.client.get(&self.key(id, name))?.is_some()),
            None => Ok(!self.client.keys_with_prefix(&self.id_prefix(id))?.is_empty()),
        }
    }

    fn delete(&self, id: &str, name: Option<&str>) -> Result<()> {
        let keys = match name {
            Some(name) => vec![self.key(id, name)],
            None => self.client.keys_with_prefix(&self.id_prefix(id))?,
        };
        self.client.delete(&keys)
    }

    fn clear(&self) -> Result<()> {
        let keys = self.client.keys_with_prefix(&self.prefix)?;
        tracing::debug!(prefix = %self.prefix, removed = keys.len(), "clearing debug keys");
        self.client.delete(&keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_scan_stops_at_boundary() {
        let client = MemoryClient::new();
        client.set("a:1", "x").unwrap();
        client.set("a:2", "y").unwrap();
        client.set("b:1", "z").unwrap();

        assert_eq!(client.keys_with_prefix("a:").unwrap(), vec!["a:1", "a:2"]);
    }

    #[test]
    fn test_clear_leaves_foreign_keys() {
        let storage = KeyValueStorage::new(MemoryClient::new(), Format::Json);
        storage.client().set("session:42", "keep me").unwrap();
        storage
            .save("req", "message", &Record::new("message", json!(["hi"])))
            .unwrap();

        storage.clear().unwrap();
        assert!(!storage.has("req", None).unwrap());
        assert_eq!(storage.client().len(), 1);

        storage.flush_all().unwrap();
        assert!(storage.client().is_empty());
    }
}
