//! A logger that records instead of emitting.

use debugkit_types::{Level, Logger};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// One captured `Logger::log` call.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRecord {
    pub level: Level,
    pub message: String,
    pub context: Value,
}

/// Clones share the same buffer, so a test can keep one handle and give
/// another to a handler.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    records: Arc<Mutex<Vec<LoggedRecord>>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle suitable for `Handler::set_logger`.
    pub fn shared(&self) -> Arc<dyn Logger> {
        Arc::new(self.clone())
    }

    pub fn records(&self) -> Vec<LoggedRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.message).collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str, context: &Value) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LoggedRecord {
                level,
                message: message.to_string(),
                context: context.clone(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clones_share_records() {
        let logger = RecordingLogger::new();
        let handle = logger.shared();

        handle.log(Level::Notice, "hello", &json!({"a": 1}));

        assert_eq!(logger.len(), 1);
        assert_eq!(logger.records()[0].level, Level::Notice);
        assert_eq!(logger.messages(), vec!["hello"]);
    }
}
