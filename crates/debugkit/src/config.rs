use debugkit_handlers::{
    ExceptionHandler, LogHandler, MemoryHandler, MessageHandler, QueryHandler, QueryProfiler,
    RequestHandler, RequestSnapshot, RuntimeHandler, TimeHandler,
};
use debugkit_storage::{
    DEFAULT_ENTRIES_TABLE, DEFAULT_TABLE, DatabaseStorage, FileStorage, Format, KeyValueStorage,
    MemoryClient, SqliteStorage, Storage,
};
use debugkit_types::{Handler, LoggingParams, TracingLogger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{Debugger, Error, Result, handler_key};

/// A handler entry: either a bare type tag or a table with options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerConfig {
    Tag(String),
    Detailed {
        #[serde(rename = "type")]
        handler_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Memory handler: report raw byte counts
        #[serde(default)]
        actual_bytes: bool,
        /// Exception handler: capture backtraces
        #[serde(default)]
        verbose: bool,
    },
}

impl HandlerConfig {
    pub fn handler_type(&self) -> &str {
        match self {
            HandlerConfig::Tag(tag) => tag,
            HandlerConfig::Detailed { handler_type, .. } => handler_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    File {
        dir: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Database {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Sqlite {
        path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        table: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Memory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Redis {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
}

impl StorageConfig {
    /// Parsed format; absent means the default (json).
    pub fn format(&self) -> Result<Format> {
        let raw = match self {
            StorageConfig::File { format, .. }
            | StorageConfig::Database { format, .. }
            | StorageConfig::Sqlite { format, .. }
            | StorageConfig::Memory { format, .. }
            | StorageConfig::Redis { format, .. } => format,
        };
        match raw {
            Some(raw) => Ok(raw.parse::<Format>()?),
            None => Ok(Format::default()),
        }
    }

    pub fn build(&self) -> Result<Arc<dyn Storage>> {
        let format = self.format()?;

        let storage: Arc<dyn Storage> = match self {
            StorageConfig::File { dir, .. } => Arc::new(FileStorage::new(dir, format)?),
            StorageConfig::Database { path, table, .. } => Arc::new(DatabaseStorage::open_with_table(
                path,
                table.as_deref().unwrap_or(DEFAULT_TABLE),
                format,
            )?),
            StorageConfig::Sqlite { path, table, .. } => Arc::new(SqliteStorage::open_with_table(
                path,
                table.as_deref().unwrap_or(DEFAULT_ENTRIES_TABLE),
                format,
            )?),
            StorageConfig::Memory { prefix, .. } => Arc::new(match prefix {
                Some(prefix) => KeyValueStorage::with_prefix(MemoryClient::new(), prefix, format),
                None => KeyValueStorage::new(MemoryClient::new(), format),
            }),
            StorageConfig::Redis { url, prefix, .. } => build_redis(url, prefix.as_deref(), format)?,
        };

        Ok(storage)
    }
}

#[cfg(feature = "redis")]
fn build_redis(url: &str, prefix: Option<&str>, format: Format) -> Result<Arc<dyn Storage>> {
    let client = debugkit_storage::RedisClient::connect(url)?;
    Ok(match prefix {
        Some(prefix) => Arc::new(KeyValueStorage::with_prefix(client, prefix, format)),
        None => Arc::new(KeyValueStorage::new(client, format)),
    })
}

#[cfg(not(feature = "redis"))]
fn build_redis(url: &str, _prefix: Option<&str>, _format: Format) -> Result<Arc<dyn Storage>> {
    Err(debugkit_storage::Error::StorageMisconfigured(format!(
        "storage '{}' needs debugkit built with the `redis` feature",
        url
    ))
    .into())
}

/// Declarative debugger setup, read from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Fixed request id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    /// Logging params by handler key or type tag; a key entry beats a tag entry.
    #[serde(default)]
    pub logging: BTreeMap<String, LoggingParams>,
}

impl DebugConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: DebugConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn build_storage(&self) -> Result<Option<Arc<dyn Storage>>> {
        self.storage.as_ref().map(StorageConfig::build).transpose()
    }

    pub fn build_handlers(&self) -> Result<Vec<Box<dyn Handler>>> {
        self.handlers
            .iter()
            .map(|entry| {
                let mut handler = create_handler(entry)?;
                let params = self
                    .logging
                    .get(&handler_key(handler.as_ref()))
                    .or_else(|| self.logging.get(handler.handler_type()));
                if let Some(params) = params {
                    attach_tracing(handler.as_mut(), params.clone());
                }
                Ok(handler)
            })
            .collect()
    }

    pub fn build_debugger(&self) -> Result<Debugger> {
        let mut debugger = match &self.request_id {
            Some(id) => Debugger::new().with_request_id(id.clone())?,
            None => Debugger::new(),
        };
        if let Some(storage) = self.build_storage()? {
            debugger.set_shared_storage(storage);
        }
        debugger.add_handlers(self.build_handlers()?);
        Ok(debugger)
    }
}

fn attach_tracing(handler: &mut dyn Handler, params: LoggingParams) {
    handler.set_logger(Arc::new(TracingLogger));
    handler.set_logging_params(params);
}

fn create_handler(entry: &HandlerConfig) -> Result<Box<dyn Handler>> {
    let (name, actual_bytes, verbose) = match entry {
        HandlerConfig::Tag(_) => (None, false, false),
        HandlerConfig::Detailed {
            name,
            actual_bytes,
            verbose,
            ..
        } => (name.clone(), *actual_bytes, *verbose),
    };

    let mut handler: Box<dyn Handler> = match entry.handler_type() {
        debugkit_handlers::exception::TYPE => Box::new(ExceptionHandler::new().verbose(verbose)),
        debugkit_handlers::log::TYPE => Box::new(LogHandler::new()),
        debugkit_handlers::memory::TYPE => {
            Box::new(MemoryHandler::new().with_actual_bytes(actual_bytes))
        }
        debugkit_handlers::message::TYPE => Box::new(MessageHandler::new()),
        debugkit_handlers::query::TYPE => {
            Box::new(QueryHandler::new(Arc::new(QueryProfiler::new())))
        }
        debugkit_handlers::request::TYPE => {
            Box::new(RequestHandler::new(RequestSnapshot::default()))
        }
        debugkit_handlers::runtime::TYPE => Box::new(RuntimeHandler::new()),
        debugkit_handlers::time::TYPE => Box::new(TimeHandler::new()),
        other => {
            return Err(Error::InvalidHandlerType(format!(
                "unknown handler type '{}', expected one of {}",
                other,
                debugkit_handlers::HANDLER_TYPES.join(", ")
            )));
        }
    };

    if let Some(name) = name {
        handler.set_name(name);
    }
    Ok(handler)
}
