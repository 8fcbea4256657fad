use std::fmt;

/// Result type for debugkit-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types raised by the handler contract
#[derive(Debug)]
pub enum Error {
    /// A logger is attached but the logging params carry no `level`
    MissingLogLevel(&'static str),

    /// A size limit could not be parsed (e.g. "10 parsecs")
    InvalidSize(String),

    /// JSON conversion failed
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingLogLevel(handler) => write!(
                f,
                "Missing log level: the {} handler has a logger attached but no 'level' in its logging params",
                handler
            ),
            Error::InvalidSize(value) => write!(f, "Invalid size value: {}", value),
            Error::Json(err) => write!(f, "JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            Error::MissingLogLevel(_) | Error::InvalidSize(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
