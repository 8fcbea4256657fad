use debugkit_types::{ContextMode, Handler, HandlerCore, Result, format_timestamp, now};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;

pub const TYPE: &str = "exception";

/// One captured error together with its `source()` chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub kind: String,
    pub message: String,
    pub sources: Vec<String>,
    pub backtrace: Option<String>,
    pub timestamp: f64,
}

impl ExceptionRecord {
    fn to_value(&self) -> Value {
        let mut value = json!({
            "class": self.kind,
            "message": self.message,
            "sources": self.sources,
            "timestamp": self.timestamp,
        });
        if let (Some(backtrace), Some(map)) = (&self.backtrace, value.as_object_mut()) {
            map.insert("backtrace".to_string(), Value::String(backtrace.clone()));
        }
        value
    }

    fn summary(&self) -> String {
        format!("{}: {}", self.kind, self.message)
    }
}

/// Captures errors raised during the request.
///
/// With `verbose` set, a backtrace is captured at the point the error is
/// added (subject to `RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`).
#[derive(Debug, Default)]
pub struct ExceptionHandler {
    core: HandlerCore,
    exceptions: Vec<ExceptionRecord>,
    verbose: bool,
}

impl ExceptionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Capture a concrete error; its type name becomes the record kind.
    pub fn add_error<E: StdError>(&mut self, err: &E) -> &mut Self {
        self.push(std::any::type_name::<E>().to_string(), err)
    }

    /// Capture a type-erased error under an explicit kind label.
    pub fn add_exception(
        &mut self,
        kind: impl Into<String>,
        err: &(dyn StdError + 'static),
    ) -> &mut Self {
        self.push(kind.into(), err)
    }

    fn push(&mut self, kind: String, err: &dyn StdError) -> &mut Self {
        let mut sources = Vec::new();
        let mut current = err.source();
        while let Some(source) = current {
            sources.push(source.to_string());
            current = source.source();
        }

        let backtrace = if self.verbose {
            let captured = Backtrace::capture();
            match captured.status() {
                BacktraceStatus::Captured => Some(captured.to_string()),
                _ => None,
            }
        } else {
            None
        };

        self.exceptions.push(ExceptionRecord {
            kind,
            message: err.to_string(),
            sources,
            backtrace,
            timestamp: now(),
        });
        self
    }

    pub fn exceptions(&self) -> &[ExceptionRecord] {
        &self.exceptions
    }

    pub fn has_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }
}

impl Handler for ExceptionHandler {
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
        Value::Array(self.exceptions.iter().map(ExceptionRecord::to_value).collect())
    }

    fn prepare_as_string(&mut self) -> String {
        let mut out = String::new();
        for record in &self.exceptions {
            out.push_str(&format!(
                "{}\t{}\n",
                format_timestamp(record.timestamp),
                record.summary()
            ));
            for source in &record.sources {
                out.push_str(&format!("\tcaused by: {}\n", source));
            }
            if let Some(backtrace) = &record.backtrace {
                for line in backtrace.lines() {
                    out.push_str(&format!("\t{}\n", line));
                }
            }
        }
        out.push('\n');
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        for record in &self.exceptions {
            let context = match target.params.context {
                ContextMode::Json => record.to_value(),
                ContextMode::Text => Value::String(record.summary()),
            };
            target.emit(&record.summary(), &context);
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "config could not be read")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_captures_source_chain() {
        let err = Outer(std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml"));
        let mut handler = ExceptionHandler::new();
        handler.add_error(&err);

        let record = &handler.exceptions()[0];
        assert!(record.kind.ends_with("Outer"));
        assert_eq!(record.message, "config could not be read");
        assert_eq!(record.sources, vec!["missing.toml".to_string()]);
        assert!(record.backtrace.is_none());
    }

    #[test]
    fn test_prepare_uses_class_key() {
        let err = std::io::Error::other("boom");
        let mut handler = ExceptionHandler::new();
        handler.add_exception("io", &err);

        let prepared = handler.prepare();
        assert_eq!(prepared[0]["class"], "io");
        assert_eq!(prepared[0]["message"], "boom");
        assert!(handler.prepare_as_string().contains("io: boom"));
    }
}
