use std::fmt;

/// Result type for debugkit-storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the storage layer
#[derive(Debug)]
pub enum Error {
    /// Text format asked to encode something other than a string
    InvalidValueType(String),

    /// Format name is not one of text/json/binary
    UnknownFormat(String),

    /// Backend could not be reached or created (unwritable dir, server down)
    StorageUnavailable(String),

    /// Backend was given invalid settings (bad table name, missing feature)
    StorageMisconfigured(String),

    /// Binary payload could not be decoded
    Codec(String),

    /// Key-value client operation failed
    KeyValue(String),

    /// Database operation failed
    Database(rusqlite::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// JSON encoding or decoding failed
    Json(serde_json::Error),

    /// Walkdir error
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidValueType(kind) => write!(
                f,
                "Invalid value type: text format can only store strings, got {}",
                kind
            ),
            Error::UnknownFormat(name) => write!(
                f,
                "Unknown storage format '{}': expected one of text, json, binary",
                name
            ),
            Error::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            Error::StorageMisconfigured(msg) => write!(f, "Storage misconfigured: {}", msg),
            Error::Codec(msg) => write!(f, "Codec error: {}", msg),
            Error::KeyValue(msg) => write!(f, "Key-value store error: {}", msg),
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::WalkDir(err) => write!(f, "Directory traversal error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidValueType(_)
            | Error::UnknownFormat(_)
            | Error::StorageUnavailable(_)
            | Error::StorageMisconfigured(_)
            | Error::Codec(_)
            | Error::KeyValue(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDir(err)
    }
}
