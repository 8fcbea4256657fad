//! Built-in handlers.
//!
//! Each handler owns one category of captured data and implements
//! [`debugkit_types::Handler`]. The registry key of a handler is its
//! `handler_type()` tag, optionally prefixed by its name.

pub mod exception;
pub mod log;
pub mod memory;
pub mod message;
pub mod query;
pub mod request;
pub mod runtime;
pub mod time;

pub use exception::{ExceptionHandler, ExceptionRecord};
pub use log::{LogEntry, LogHandler, LogSink};
pub use memory::{MemoryHandler, MemorySample};
pub use message::{MessageHandler, MessageRecord};
pub use query::{Profiler, QueryHandler, QueryProfiler, QueryStep};
pub use request::{RequestHandler, RequestSnapshot, UploadedFile};
pub use runtime::{RuntimeHandler, RuntimeInfo};
pub use time::TimeHandler;

/// Type tags of every built-in handler, in documentation order.
pub const HANDLER_TYPES: [&str; 8] = [
    exception::TYPE,
    log::TYPE,
    memory::TYPE,
    message::TYPE,
    query::TYPE,
    request::TYPE,
    runtime::TYPE,
    time::TYPE,
];
