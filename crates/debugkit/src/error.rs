use std::fmt;

/// Result type for debugger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while assembling or driving a debugger
#[derive(Debug)]
pub enum Error {
    /// Handler layer error (logging)
    Handler(debugkit_types::Error),

    /// Storage layer error
    Storage(debugkit_storage::Error),

    /// A non-handler was assigned into the registry, or a config named an
    /// unknown handler type
    InvalidHandlerType(String),

    /// `save()` was called without a storage
    NoStorageConfigured,

    /// A pinned request id was empty or contained characters outside
    /// `[A-Za-z0-9_.]`
    InvalidRequestId(String),

    /// Configuration error
    Config(String),

    /// IO operation failed
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Handler(err) => write!(f, "Handler error: {}", err),
            Error::Storage(err) => write!(f, "Storage error: {}", err),
            Error::InvalidHandlerType(what) => write!(f, "Invalid handler type: {}", what),
            Error::NoStorageConfigured => write!(f, "No storage configured"),
            Error::InvalidRequestId(id) => write!(f, "Invalid request id: {:?}", id),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Handler(err) => Some(err),
            Error::Storage(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::InvalidHandlerType(_)
            | Error::NoStorageConfigured
            | Error::InvalidRequestId(_)
            | Error::Config(_) => None,
        }
    }
}

impl From<debugkit_types::Error> for Error {
    fn from(err: debugkit_types::Error) -> Self {
        Error::Handler(err)
    }
}

impl From<debugkit_storage::Error> for Error {
    fn from(err: debugkit_storage::Error) -> Self {
        Error::Storage(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
