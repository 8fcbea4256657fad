use serde_json::Value;

use crate::Level;

/// Logging capability consumed by handlers.
///
/// Handlers never format or route log lines themselves; they hand a level,
/// a message and their prepared context to whatever implements this trait.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str, context: &Value);
}

/// Forwards handler log calls to `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, context: &Value) {
        match level {
            Level::Emergency | Level::Alert | Level::Critical | Level::Error => {
                tracing::error!(target: "debugkit", severity = %level, context = %context, "{}", message)
            }
            Level::Warning => {
                tracing::warn!(target: "debugkit", severity = %level, context = %context, "{}", message)
            }
            Level::Notice | Level::Info => {
                tracing::info!(target: "debugkit", severity = %level, context = %context, "{}", message)
            }
            Level::Debug => {
                tracing::debug!(target: "debugkit", severity = %level, context = %context, "{}", message)
            }
        }
    }
}
