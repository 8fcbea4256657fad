//! Request-scoped debug data collection.
//!
//! A [`Debugger`] holds a set of handlers, each capturing one category of
//! diagnostic data, and optionally a [`Storage`] to persist what they
//! captured under a per-request id.
//!
//! ```
//! use debugkit::{Debugger, MessageHandler, TimeHandler};
//!
//! let mut debugger = Debugger::new();
//! debugger.add(MessageHandler::new()).add(TimeHandler::new());
//!
//! debugger
//!     .get_as_mut::<MessageHandler>("message")
//!     .unwrap()
//!     .add_message("booted");
//!
//! let report = debugger.render_with_headers();
//! assert!(report.starts_with("Message Handler\n"));
//! ```

mod component;
pub mod config;
mod debugger;
mod error;
mod request_id;

pub use component::Component;
pub use config::{DebugConfig, HandlerConfig, StorageConfig};
pub use debugger::{Debugger, handler_key};
pub use error::{Error, Result};

// Re-export the building blocks so most callers need only this crate
pub use debugkit_handlers::*;
pub use debugkit_storage::{
    DatabaseStorage, FileStorage, Format, KeyValueClient, KeyValueStorage, MemoryClient, Record,
    SqliteStorage, Storage,
};
pub use debugkit_types::{
    ContextMode, Handler, HandlerCore, Level, Logger, LoggingParams, MemoryLimit, TracingLogger,
};

#[cfg(feature = "redis")]
pub use debugkit_storage::RedisClient;
