use serde::{Deserialize, Serialize};

use crate::{Level, Result, parse_size};

/// How a handler hands its context to the logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    /// The structured `prepare()` value
    #[default]
    Json,
    /// The `prepare_as_string()` rendering wrapped in a JSON string
    Text,
}

/// A memory threshold given either as a byte count or a size string ("10MB").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryLimit {
    Bytes(u64),
    Text(String),
}

impl MemoryLimit {
    pub fn bytes(&self) -> Result<u64> {
        match self {
            MemoryLimit::Bytes(bytes) => Ok(*bytes),
            MemoryLimit::Text(text) => parse_size(text),
        }
    }
}

impl From<u64> for MemoryLimit {
    fn from(bytes: u64) -> Self {
        MemoryLimit::Bytes(bytes)
    }
}

impl From<&str> for MemoryLimit {
    fn from(text: &str) -> Self {
        MemoryLimit::Text(text.to_string())
    }
}

/// Logging configuration attached to a handler alongside its logger.
///
/// `level` is the only option every handler requires. The others are
/// thresholds read by individual handlers:
/// - `limit`: seconds, for time and query handlers
/// - `usage_limit` / `peak_limit`: memory handler
/// - `version` / `extensions`: runtime handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingParams {
    pub level: Option<Level>,
    pub limit: Option<f64>,
    pub usage_limit: Option<MemoryLimit>,
    pub peak_limit: Option<MemoryLimit>,
    pub version: Option<String>,
    pub extensions: Vec<String>,
    pub context: ContextMode,
}

impl LoggingParams {
    pub fn new(level: Level) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_usage_limit(mut self, limit: impl Into<MemoryLimit>) -> Self {
        self.usage_limit = Some(limit.into());
        self
    }

    pub fn with_peak_limit(mut self, limit: impl Into<MemoryLimit>) -> Self {
        self.peak_limit = Some(limit.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: ContextMode) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_params_have_no_level() {
        let params: LoggingParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, LoggingParams::default());
        assert!(params.level.is_none());
    }

    #[test]
    fn test_deserialize_mixed_limits() {
        let params: LoggingParams = serde_json::from_str(
            r#"{"level": "warning", "usage_limit": "2MB", "peak_limit": 4096, "context": "text"}"#,
        )
        .unwrap();

        assert_eq!(params.level, Some(Level::Warning));
        assert_eq!(params.usage_limit.unwrap().bytes().unwrap(), 2 * 1024 * 1024);
        assert_eq!(params.peak_limit.unwrap().bytes().unwrap(), 4096);
        assert_eq!(params.context, ContextMode::Text);
    }
}
