// Persistence backends for prepared handler data.
// Every backend keys records by (request id, handler key).

mod codec;
mod database;
mod error;
mod file;
mod format;
mod key;
mod kv;
mod record;
mod schema;
mod sqlite;
mod traits;

#[cfg(feature = "redis")]
mod redis_client;

// Public API
pub use codec::{decode_binary, encode_binary};
pub use database::{DEFAULT_TABLE, DatabaseStorage, DebugRow};
pub use error::{Error, Result};
pub use file::FileStorage;
pub use format::Format;
pub use key::{composite_key, matches_type};
pub use kv::{KeyValueClient, KeyValueStorage, MemoryClient};
pub use record::Record;
pub use sqlite::{DEFAULT_ENTRIES_TABLE, SqliteStorage};
pub use traits::Storage;

#[cfg(feature = "redis")]
pub use redis_client::RedisClient;
