use debugkit_types::{Handler, HandlerCore, Result, format_timestamp};
use serde_json::{Value, json};
use std::any::Any;

pub const TYPE: &str = "time";

/// Measures wall-clock time between `start` and `stop`.
///
/// Reporting (`prepare*`, `log`) stops the clock if nobody did.
#[derive(Debug, Default)]
pub struct TimeHandler {
    core: HandlerCore,
}

impl TimeHandler {
    /// A handler whose clock starts immediately.
    pub fn new() -> Self {
        let mut handler = Self::default();
        handler.core.start(None);
        handler
    }

    /// A handler that waits for an explicit `start()`.
    pub fn unstarted() -> Self {
        Self::default()
    }

    pub fn started_at(start: f64) -> Self {
        let mut handler = Self::default();
        handler.core.start(Some(start));
        handler
    }
}

impl Handler for TimeHandler {
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
        self.core.ensure_stopped();

        json!({
            "start": self.core.start_time(),
            "end": self.core.end_time(),
            "elapsed": self.core.elapsed(),
        })
    }

    fn prepare_as_string(&mut self) -> String {
        self.core.ensure_stopped();

        let stamp = |ts: Option<f64>| ts.map(format_timestamp).unwrap_or_else(|| "-".to_string());
        let elapsed = self
            .core
            .elapsed()
            .map(|e| format!("{:.5} seconds", e))
            .unwrap_or_else(|| "-".to_string());

        format!(
            "Start:\t\t{}\nFinish:\t\t{}\nElapsed:\t{}\n\n",
            stamp(self.core.start_time()),
            stamp(self.core.end_time()),
            elapsed
        )
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        self.core.ensure_stopped();
        let Some(elapsed) = self.core.elapsed() else {
            return Ok(());
        };

        let message = match target.params.limit {
            Some(limit) if elapsed >= limit => format!(
                "Elapsed time limit of {} second(s) has been exceeded by {:.5} second(s)",
                limit,
                elapsed - limit
            ),
            Some(_) => return Ok(()),
            None => format!("Elapsed time: {:.5} second(s)", elapsed),
        };

        let context = self.log_context(target.params.context);
        target.emit(&message, &context);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
