use debugkit_types::{
    ContextMode, Handler, HandlerCore, Level, Logger, Result, format_timestamp, now,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const TYPE: &str = "log";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: f64,
    pub level: Level,
    pub message: String,
    pub context: Value,
}

impl LogEntry {
    fn to_value(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "level": self.level,
            "message": self.message,
            "context": self.context,
        })
    }

    fn to_text(&self) -> String {
        let mut line = format!(
            "{}\t[{}]\t{}",
            format_timestamp(self.timestamp),
            self.level.as_str().to_ascii_uppercase(),
            self.message
        );
        if !self.context.is_null() {
            line.push_str(&format!("\t{}", self.context));
        }
        line
    }
}

type SharedEntries = Arc<Mutex<Vec<LogEntry>>>;

fn lock(entries: &SharedEntries) -> MutexGuard<'_, Vec<LogEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A [`Logger`] that appends into the [`LogHandler`] it came from.
///
/// Attach it to other handlers to collect their log output in the report.
#[derive(Debug, Clone)]
pub struct LogSink {
    entries: SharedEntries,
}

impl Logger for LogSink {
    fn log(&self, level: Level, message: &str, context: &Value) {
        lock(&self.entries).push(LogEntry {
            timestamp: now(),
            level,
            message: message.to_string(),
            context: context.clone(),
        });
    }
}

/// Collects log entries produced during the request.
///
/// `log()` forwards every entry to the attached logger at the configured
/// level. The entry's own level travels in the context.
#[derive(Debug, Default)]
pub struct LogHandler {
    core: HandlerCore,
    entries: SharedEntries,
}

impl LogHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_log(&mut self, level: Level, message: impl Into<String>, context: Value) -> &mut Self {
        lock(&self.entries).push(LogEntry {
            timestamp: now(),
            level,
            message: message.into(),
            context,
        });
        self
    }

    pub fn sink(&self) -> LogSink {
        LogSink {
            entries: Arc::clone(&self.entries),
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }

    pub fn has_entries(&self) -> bool {
        !lock(&self.entries).is_empty()
    }
}

impl Handler for LogHandler {
    fn handler_type(&self) -> &'static str {
        TYPE
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut HandlerCore {
        &mut self.core
    }

    fn prepare(&mut self) -> Value {
        Value::Array(lock(&self.entries).iter().map(LogEntry::to_value).collect())
    }

    fn prepare_as_string(&mut self) -> String {
        let mut out = String::new();
        for entry in lock(&self.entries).iter() {
            out.push_str(&entry.to_text());
            out.push('\n');
        }
        out.push('\n');
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        // Snapshot first: the target may be this handler's own sink.
        let entries = self.entries();
        for entry in &entries {
            let context = match target.params.context {
                ContextMode::Json => entry.to_value(),
                ContextMode::Text => Value::String(entry.to_text()),
            };
            target.emit(&entry.message, &context);
        }

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
