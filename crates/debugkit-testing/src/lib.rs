//! Testing infrastructure for debugkit integration tests.
//!
//! - `TestWorld`: isolated storage directory with helpers to inspect it
//! - `RecordingLogger`: a `Logger` that keeps every call for later assertions
//! - `assertions`: checks for request ids, stored records and log calls
//! - `fixtures`: deterministic records and timestamps

pub mod assertions;
pub mod fixtures;
pub mod logger;
pub mod world;

pub use logger::{LoggedRecord, RecordingLogger};
pub use world::TestWorld;
