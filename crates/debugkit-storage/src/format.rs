use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result, decode_binary, encode_binary};

/// Encoding applied to values before they reach the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Strings only, stored verbatim
    Text,
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Tagged binary codec, base64 wrapped
    Binary,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
            Format::Binary => "binary",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Format::Text)
    }

    pub fn encode(&self, value: &Value) -> Result<String> {
        match self {
            Format::Text => match value {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::InvalidValueType(value_kind(other).to_string())),
            },
            Format::Json => Ok(serde_json::to_string_pretty(value)?),
            Format::Binary => Ok(STANDARD.encode(encode_binary(value)?)),
        }
    }

    pub fn decode(&self, raw: &str) -> Result<Value> {
        match self {
            Format::Text => Ok(Value::String(raw.to_string())),
            Format::Json => Ok(serde_json::from_str(raw)?),
            Format::Binary => {
                let bytes = STANDARD
                    .decode(raw.trim())
                    .map_err(|e| Error::Codec(format!("invalid base64: {}", e)))?;
                decode_binary(&bytes)
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "binary" => Ok(Format::Binary),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_rejects_structured_values() {
        assert_eq!(Format::Text.encode(&json!("plain")).unwrap(), "plain");
        let err = Format::Text.encode(&json!({"a": 1})).unwrap_err();
        assert!(matches!(err, Error::InvalidValueType(kind) if kind == "object"));
    }

    #[test]
    fn test_json_is_pretty() {
        let encoded = Format::Json.encode(&json!({"message": "hello"})).unwrap();
        assert_eq!(encoded, "{\n  \"message\": \"hello\"\n}");
        assert_eq!(Format::Json.decode(&encoded).unwrap(), json!({"message": "hello"}));
    }

    #[test]
    fn test_binary_is_base64_text() {
        let value = json!([1, "two", 3.5]);
        let encoded = Format::Binary.encode(&value).unwrap();
        assert!(encoded.is_ascii());
        assert_eq!(Format::Binary.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert!(matches!("php".parse::<Format>(), Err(Error::UnknownFormat(_))));
    }
}
