use serde_json::Value;

use crate::{Format, Record, Result};

/// Persistence backend for prepared handler data.
///
/// Records are keyed by request id plus handler key. Lookups without a
/// handler key return an object mapping handler key to decoded data;
/// `get_by_type` returns an object keyed by `<id>-<handler key>`.
/// Saving an existing key overwrites it.
pub trait Storage: Send + Sync {
    /// Encoding applied to stored values
    fn format(&self) -> Format;

    fn save(&self, id: &str, name: &str, record: &Record) -> Result<()>;

    fn get_by_id(&self, id: &str, name: Option<&str>) -> Result<Option<Value>>;

    fn get_by_type(&self, handler_type: &str) -> Result<Option<Value>>;

    fn has(&self, id: &str, name: Option<&str>) -> Result<bool>;

    fn delete(&self, id: &str, name: Option<&str>) -> Result<()>;

    /// Remove every record in this backend's scope
    fn clear(&self) -> Result<()>;

    fn encode_value(&self, value: &Value) -> Result<String> {
        self.format().encode(value)
    }

    fn decode_value(&self, raw: &str) -> Result<Value> {
        self.format().decode(raw)
    }
}
