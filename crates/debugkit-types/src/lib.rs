pub mod error;
pub mod handler;
pub mod level;
pub mod logger;
pub mod params;
mod util;

pub use error::{Error, Result};
pub use handler::{Handler, HandlerCore, LogTarget, render_header};
pub use level::Level;
pub use logger::{Logger, TracingLogger};
pub use params::{ContextMode, LoggingParams, MemoryLimit};
pub use util::*;
