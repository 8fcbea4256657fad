use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{ContextMode, Error, Level, Logger, LoggingParams, Result, now, title_case};

/// State every handler carries: label, timing triple and logging attachment.
#[derive(Clone, Default)]
pub struct HandlerCore {
    name: Option<String>,
    start: Option<f64>,
    end: Option<f64>,
    elapsed: Option<f64>,
    logger: Option<Arc<dyn Logger>>,
    logging_params: Option<LoggingParams>,
}

/// Resolved logging destination for one `log()` call.
#[derive(Clone)]
pub struct LogTarget {
    pub logger: Arc<dyn Logger>,
    pub level: Level,
    pub params: LoggingParams,
}

impl LogTarget {
    pub fn emit(&self, message: &str, context: &Value) {
        self.logger.log(self.level, message, context);
    }
}

impl HandlerCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn start(&mut self, at: Option<f64>) {
        self.start = Some(at.unwrap_or_else(now));
    }

    /// Record the end time; elapsed is only derived when a start is known.
    pub fn stop(&mut self, at: Option<f64>) {
        let end = at.unwrap_or_else(now);
        self.end = Some(end);
        if let Some(start) = self.start {
            self.elapsed = Some(end - start);
        }
    }

    /// Implicit stop used by time-based handlers before they report.
    pub fn ensure_stopped(&mut self) {
        if self.end.is_none() {
            self.stop(None);
        }
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end
    }

    pub fn set_elapsed(&mut self, elapsed: f64) {
        self.elapsed = Some(elapsed);
    }

    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = Some(logger);
    }

    pub fn logger(&self) -> Option<&Arc<dyn Logger>> {
        self.logger.as_ref()
    }

    pub fn set_logging_params(&mut self, params: LoggingParams) {
        self.logging_params = Some(params);
    }

    pub fn logging_params(&self) -> Option<&LoggingParams> {
        self.logging_params.as_ref()
    }

    /// `Ok(None)` when no logger is attached (logging is a no-op), an error
    /// when a logger is attached without a `level`.
    pub fn log_target(&self, handler_type: &'static str) -> Result<Option<LogTarget>> {
        let Some(logger) = &self.logger else {
            return Ok(None);
        };

        let params = self.logging_params.clone().unwrap_or_default();
        let level = params.level.ok_or(Error::MissingLogLevel(handler_type))?;

        Ok(Some(LogTarget {
            logger: Arc::clone(logger),
            level,
            params,
        }))
    }
}

impl fmt::Debug for HandlerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerCore")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("elapsed", &self.elapsed)
            .field("has_logger", &self.logger.is_some())
            .field("logging_params", &self.logging_params)
            .finish()
    }
}

/// Section banner: title line, a dash underline of equal width, blank line.
pub fn render_header(name: Option<&str>, handler_type: &str) -> String {
    let title = match name {
        Some(name) => format!("{} {} Handler", name, title_case(handler_type)),
        None => format!("{} Handler", title_case(handler_type)),
    };
    let underline = "-".repeat(title.chars().count());
    format!("{}\n{}\n\n", title, underline)
}

/// A pluggable unit that captures one category of diagnostic data.
///
/// Implementors supply a static type tag, access to their [`HandlerCore`] and
/// the three renderings; naming, timing and logger plumbing come for free.
pub trait Handler: Any + Send {
    /// Registry discriminator, e.g. "message" or "time"
    fn handler_type(&self) -> &'static str;

    fn core(&self) -> &HandlerCore;

    fn core_mut(&mut self) -> &mut HandlerCore;

    /// Storage-ready structured representation
    fn prepare(&mut self) -> Value;

    /// Human-readable rendering of the same data
    fn prepare_as_string(&mut self) -> String;

    /// Send captured data to the attached logger, if any
    fn log(&mut self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn prepare_header_as_string(&self) -> String {
        render_header(self.name(), self.handler_type())
    }

    fn set_name(&mut self, name: String) {
        self.core_mut().set_name(name);
    }

    fn name(&self) -> Option<&str> {
        self.core().name()
    }

    fn has_name(&self) -> bool {
        self.core().name().is_some()
    }

    fn start(&mut self, at: Option<f64>) {
        self.core_mut().start(at);
    }

    fn stop(&mut self, at: Option<f64>) {
        self.core_mut().stop(at);
    }

    fn start_time(&self) -> Option<f64> {
        self.core().start_time()
    }

    fn end_time(&self) -> Option<f64> {
        self.core().end_time()
    }

    fn set_elapsed(&mut self, elapsed: f64) {
        self.core_mut().set_elapsed(elapsed);
    }

    fn elapsed(&self) -> Option<f64> {
        self.core().elapsed()
    }

    fn has_elapsed(&self) -> bool {
        self.core().elapsed().is_some()
    }

    fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.core_mut().set_logger(logger);
    }

    fn logger(&self) -> Option<&Arc<dyn Logger>> {
        self.core().logger()
    }

    fn has_logger(&self) -> bool {
        self.core().logger().is_some()
    }

    fn set_logging_params(&mut self, params: LoggingParams) {
        self.core_mut().set_logging_params(params);
    }

    fn logging_params(&self) -> Option<&LoggingParams> {
        self.core().logging_params()
    }

    fn has_logging_params(&self) -> bool {
        self.core().logging_params().is_some()
    }

    /// Context value passed to the logger, honouring `ContextMode`.
    fn log_context(&mut self, mode: ContextMode) -> Value {
        match mode {
            ContextMode::Json => self.prepare(),
            ContextMode::Text => Value::String(self.prepare_as_string()),
        }
    }

    fn named(mut self, name: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.set_name(name.into());
        self
    }

    fn with_logger(mut self, logger: Arc<dyn Logger>, params: LoggingParams) -> Self
    where
        Self: Sized,
    {
        self.set_logger(logger);
        self.set_logging_params(params);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_derives_elapsed() {
        let mut core = HandlerCore::new();
        core.start(Some(10.25));
        core.stop(Some(12.75));
        assert_eq!(core.elapsed(), Some(2.5));
    }

    #[test]
    fn test_stop_without_start_leaves_elapsed_unset() {
        let mut core = HandlerCore::new();
        core.stop(Some(5.0));
        assert_eq!(core.end_time(), Some(5.0));
        assert!(core.elapsed().is_none());
    }

    #[test]
    fn test_restart_resets_start() {
        let mut core = HandlerCore::new();
        core.start(Some(1.0));
        core.start(Some(3.0));
        core.stop(Some(4.0));
        assert_eq!(core.start_time(), Some(3.0));
        assert_eq!(core.elapsed(), Some(1.0));
    }

    #[test]
    fn test_log_target_without_logger_is_none() {
        let core = HandlerCore::new();
        assert!(core.log_target("message").unwrap().is_none());
    }

    #[test]
    fn test_header_underline_matches_title() {
        assert_eq!(render_header(None, "time"), "Time Handler\n------------\n\n");
        assert_eq!(
            render_header(Some("db"), "query"),
            "db Query Handler\n----------------\n\n"
        );
    }
}
