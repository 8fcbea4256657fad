use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What the debugger hands a backend for one handler: its key, its timing
/// and its prepared data (a string for text-format storages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub handler: String,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub elapsed: Option<f64>,
    pub data: Value,
}

impl Record {
    pub fn new(handler: impl Into<String>, data: Value) -> Self {
        Self {
            handler: handler.into(),
            start: None,
            end: None,
            elapsed: None,
            data,
        }
    }

    pub fn with_timing(mut self, start: Option<f64>, end: Option<f64>, elapsed: Option<f64>) -> Self {
        self.start = start;
        self.end = end;
        self.elapsed = elapsed;
        self
    }
}
