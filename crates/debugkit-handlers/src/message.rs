use debugkit_types::{ContextMode, Handler, HandlerCore, Result, format_timestamp, now};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::any::Any;

pub const TYPE: &str = "message";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message: String,
    pub timestamp: f64,
}

impl MessageRecord {
    fn to_value(&self) -> Value {
        json!({
            "message": self.message,
            "timestamp": self.timestamp,
        })
    }
}

/// Collects free-form debug messages in the order they were added.
#[derive(Debug, Default)]
pub struct MessageHandler {
    core: HandlerCore,
    messages: Vec<MessageRecord>,
}

impl MessageHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.add_message_at(message, now())
    }

    pub fn add_message_at(&mut self, message: impl Into<String>, timestamp: f64) -> &mut Self {
        self.messages.push(MessageRecord {
            message: message.into(),
            timestamp,
        });
        self
    }

    pub fn messages(&self) -> &[MessageRecord] {
        &self.messages
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }
}

impl Handler for MessageHandler {
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
        Value::Array(self.messages.iter().map(MessageRecord::to_value).collect())
    }

    fn prepare_as_string(&mut self) -> String {
        let mut out = String::new();
        for record in &self.messages {
            out.push_str(&format!(
                "{}\t{}\n",
                format_timestamp(record.timestamp),
                record.message
            ));
        }
        out.push('\n');
        out
    }

    fn log(&mut self) -> Result<()> {
        let Some(target) = self.core.log_target(TYPE)? else {
            return Ok(());
        };

        // One log line per message; the record itself is the context.
        for record in &self.messages {
            let context = match target.params.context {
                ContextMode::Json => record.to_value(),
                ContextMode::Text => Value::String(format!(
                    "{}\t{}",
                    format_timestamp(record.timestamp),
                    record.message
                )),
            };
            target.emit(&record.message, &context);
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

    #[test]
    fn test_prepare_keeps_insertion_order() {
        let mut handler = MessageHandler::new();
        handler.add_message_at("first", 1.5).add_message_at("second", 2.5);

        assert_eq!(
            handler.prepare(),
            json!([
                {"message": "first", "timestamp": 1.5},
                {"message": "second", "timestamp": 2.5},
            ])
        );
    }

    #[test]
    fn test_prepare_as_string_lines() {
        let mut handler = MessageHandler::new();
        handler.add_message_at("hello", 0.5);

        assert_eq!(
            handler.prepare_as_string(),
            "1970-01-01 00:00:00.500\thello\n\n"
        );
    }

    #[test]
    fn test_named_header() {
        let handler = MessageHandler::new().named("boot");
        assert_eq!(handler.name(), Some("boot"));
        assert!(handler.prepare_header_as_string().starts_with("boot Message Handler\n"));
    }
}
