use debugkit_storage::{Record, Storage};
use debugkit_types::Handler;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{Component, Error, Result, request_id};

/// Registry key of a handler: its type tag, prefixed by `<name>-` when named.
pub fn handler_key(handler: &dyn Handler) -> String {
    match handler.name() {
        Some(name) => format!("{}-{}", name, handler.handler_type()),
        None => handler.handler_type().to_string(),
    }
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.'))
}

/// Holds the handlers of one request, in registration order, plus an
/// optional storage to persist them into.
#[derive(Default)]
pub struct Debugger {
    handlers: Vec<(String, Box<dyn Handler>)>,
    storage: Option<Arc<dyn Storage>>,
    request_id: OnceLock<String>,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any mix of handlers, storages and groups of them.
    /// The last storage seen wins.
    pub fn with_components(components: impl IntoIterator<Item = Component>) -> Self {
        let mut debugger = Self::new();
        for component in components {
            debugger.add_component(component);
        }
        debugger
    }

    /// Pin the request id instead of generating one.
    ///
    /// Storages key records as `<id>-<name>`, so the id may not contain `-`.
    /// Only ASCII letters, digits, `_` and `.` are accepted.
    pub fn with_request_id(mut self, id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !is_valid_request_id(&id) {
            return Err(Error::InvalidRequestId(id));
        }
        self.request_id = OnceLock::from(id);
        Ok(self)
    }

    pub fn add_component(&mut self, component: Component) -> &mut Self {
        match component {
            Component::Handler(handler) => {
                self.add_handler(handler);
            }
            Component::Storage(storage) => {
                self.storage = Some(storage);
            }
            Component::Group(components) => {
                for component in components {
                    self.add_component(component);
                }
            }
        }
        self
    }

    /// Register under the derived key; an existing entry with the same key
    /// is replaced in place.
    pub fn add_handler(&mut self, handler: Box<dyn Handler>) -> &mut Self {
        let key = handler_key(handler.as_ref());
        self.insert(key, handler);
        self
    }

    pub fn add(&mut self, handler: impl Handler) -> &mut Self {
        self.add_handler(Box::new(handler))
    }

    pub fn add_handlers(&mut self, handlers: impl IntoIterator<Item = Box<dyn Handler>>) -> &mut Self {
        for handler in handlers {
            self.add_handler(handler);
        }
        self
    }

    pub fn set_storage(&mut self, storage: impl Storage + 'static) -> &mut Self {
        self.set_shared_storage(Arc::new(storage))
    }

    pub fn set_shared_storage(&mut self, storage: Arc<dyn Storage>) -> &mut Self {
        self.storage = Some(storage);
        self
    }

    pub fn storage(&self) -> Option<&Arc<dyn Storage>> {
        self.storage.as_ref()
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.handlers.iter().position(|(k, _)| k == key)
    }

    fn insert(&mut self, key: String, handler: Box<dyn Handler>) {
        match self.position(&key) {
            Some(index) => self.handlers[index].1 = handler,
            None => self.handlers.push((key, handler)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&dyn Handler> {
        self.handlers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, handler)| handler.as_ref())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut dyn Handler> {
        let (_, handler) = self.handlers.iter_mut().find(|(k, _)| k == key)?;
        Some(handler.as_mut())
    }

    /// Typed access; `None` when the key is missing or holds another type.
    pub fn get_as<T: Handler>(&self, key: &str) -> Option<&T> {
        self.get(key)?.as_any().downcast_ref::<T>()
    }

    pub fn get_as_mut<T: Handler>(&mut self, key: &str) -> Option<&mut T> {
        self.get_mut(key)?.as_any_mut().downcast_mut::<T>()
    }

    /// Store a handler under an explicit key. Anything other than a handler
    /// is rejected.
    pub fn set(&mut self, key: impl Into<String>, component: Component) -> Result<()> {
        let key = key.into();
        match component {
            Component::Handler(handler) => {
                self.insert(key, handler);
                Ok(())
            }
            other => Err(Error::InvalidHandlerType(format!(
                "cannot store a {} under '{}'",
                other.kind(),
                key
            ))),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Handler>> {
        let index = self.position(key)?;
        Some(self.handlers.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Handler)> {
        self.handlers
            .iter()
            .map(|(key, handler)| (key.as_str(), handler.as_ref()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Generated on first use, then stable for the life of the debugger.
    pub fn request_id(&self) -> &str {
        self.request_id.get_or_init(request_id::generate)
    }

    /// Persist every handler under the request id and return that id.
    ///
    /// Text-format storages receive `prepare_as_string()`, the others
    /// `prepare()`. Timing is read after preparing so implicit stops are
    /// included.
    pub fn save(&mut self) -> Result<String> {
        let storage = self.storage.clone().ok_or(Error::NoStorageConfigured)?;
        let id = self.request_id().to_string();
        let as_text = storage.format().is_text();

        for (key, handler) in self.handlers.iter_mut() {
            let data = if as_text {
                Value::String(handler.prepare_as_string())
            } else {
                handler.prepare()
            };
            let record = Record::new(key.clone(), data).with_timing(
                handler.start_time(),
                handler.end_time(),
                handler.elapsed(),
            );
            storage.save(&id, key, &record)?;
        }

        tracing::debug!(request_id = %id, handlers = self.handlers.len(), "saved debug data");
        Ok(id)
    }

    /// Run `log()` on every handler, stopping at the first failure.
    pub fn log(&mut self) -> Result<()> {
        for (_, handler) in self.handlers.iter_mut() {
            handler.log()?;
        }
        Ok(())
    }

    pub fn render(&mut self) -> String {
        self.handlers
            .iter_mut()
            .map(|(_, handler)| handler.prepare_as_string())
            .collect()
    }

    pub fn render_with_headers(&mut self) -> String {
        let mut out = String::new();
        for (_, handler) in self.handlers.iter_mut() {
            out.push_str(&handler.prepare_header_as_string());
            out.push_str(&handler.prepare_as_string());
        }
        out
    }

    /// Every handler's `prepare()` output keyed by handler key.
    pub fn collect(&mut self) -> Value {
        let mut map = Map::new();
        for (key, handler) in self.handlers.iter_mut() {
            map.insert(key.clone(), handler.prepare());
        }
        Value::Object(map)
    }
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("handlers", &self.keys().collect::<Vec<_>>())
            .field("has_storage", &self.storage.is_some())
            .field("request_id", &self.request_id.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debugkit_handlers::{MessageHandler, TimeHandler};
    use debugkit_storage::{Format, KeyValueStorage, MemoryClient};

    #[test]
    fn test_key_derivation() {
        let mut debugger = Debugger::new();
        debugger
            .add(MessageHandler::new())
            .add(TimeHandler::unstarted().named("boot"));

        assert_eq!(debugger.keys().collect::<Vec<_>>(), vec!["message", "boot-time"]);
    }

    #[test]
    fn test_same_key_replaces_in_place() {
        let mut debugger = Debugger::new();
        debugger
            .add(MessageHandler::new())
            .add(TimeHandler::unstarted());

        let mut replacement = MessageHandler::new();
        replacement.add_message_at("second", 2.5);
        debugger.add(replacement);

        assert_eq!(debugger.len(), 2);
        assert_eq!(debugger.keys().collect::<Vec<_>>(), vec!["message", "time"]);
        let message = debugger.get_as::<MessageHandler>("message").unwrap();
        assert_eq!(message.messages().len(), 1);
    }

    #[test]
    fn test_components_flatten_and_last_storage_wins() {
        let debugger = Debugger::with_components([
            Component::handler(MessageHandler::new()),
            Component::storage(KeyValueStorage::new(MemoryClient::new(), Format::Json)),
            Component::group([
                Component::handler(TimeHandler::unstarted()),
                Component::storage(KeyValueStorage::new(MemoryClient::new(), Format::Text)),
            ]),
        ]);

        assert_eq!(debugger.len(), 2);
        assert_eq!(debugger.storage().map(|s| s.format()), Some(Format::Text));
    }

    #[test]
    fn test_set_rejects_storage() {
        let mut debugger = Debugger::new();
        let err = debugger
            .set(
                "message",
                Component::storage(KeyValueStorage::new(MemoryClient::new(), Format::Json)),
            )
            .unwrap_err();

        assert!(matches!(err, Error::InvalidHandlerType(_)));
        assert!(debugger.is_empty());
    }

    #[test]
    fn test_set_uses_explicit_key() {
        let mut debugger = Debugger::new();
        debugger
            .set("custom", Component::handler(MessageHandler::new()))
            .unwrap();

        assert!(debugger.contains("custom"));
        assert!(!debugger.contains("message"));
    }

    #[test]
    fn test_typed_access_checks_type() {
        let mut debugger = Debugger::new();
        debugger.add(MessageHandler::new());

        assert!(debugger.get_as::<TimeHandler>("message").is_none());
        debugger
            .get_as_mut::<MessageHandler>("message")
            .unwrap()
            .add_message_at("hi", 1.0);
        assert_eq!(
            debugger.get_as::<MessageHandler>("message").unwrap().messages()[0].message,
            "hi"
        );
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut debugger = Debugger::new();
        debugger.add(MessageHandler::new());

        assert!(debugger.remove("time").is_none());
        assert!(debugger.remove("message").is_some());
        assert!(debugger.is_empty());
    }

    #[test]
    fn test_request_id_is_stable() {
        let debugger = Debugger::new();
        let first = debugger.request_id().to_string();

        assert_eq!(debugger.request_id(), first);
        assert_ne!(Debugger::new().request_id(), first);
        assert_eq!(
            Debugger::new().with_request_id("fixed").unwrap().request_id(),
            "fixed"
        );
    }

    #[test]
    fn test_pinned_request_id_rejects_separator() {
        for id in ["abc-x", "", "a b", "a/b"] {
            match Debugger::new().with_request_id(id) {
                Err(Error::InvalidRequestId(reported)) => assert_eq!(reported, id),
                other => panic!("{:?}: expected InvalidRequestId, got {:?}", id, other),
            }
        }
        assert!(Debugger::new().with_request_id("build_42.1").is_ok());
    }

    #[test]
    fn test_save_without_storage() {
        let mut debugger = Debugger::new();
        debugger.add(MessageHandler::new());

        assert!(matches!(debugger.save(), Err(Error::NoStorageConfigured)));
    }
}
