use debugkit_storage::Storage;
use debugkit_types::Handler;
use std::fmt;
use std::sync::Arc;

/// Anything a debugger can be assembled from.
///
/// Groups are flattened in order, so handlers and a storage can be passed
/// together as one list.
pub enum Component {
    Handler(Box<dyn Handler>),
    Storage(Arc<dyn Storage>),
    Group(Vec<Component>),
}

impl Component {
    pub fn handler(handler: impl Handler) -> Self {
        Component::Handler(Box::new(handler))
    }

    pub fn storage(storage: impl Storage + 'static) -> Self {
        Component::Storage(Arc::new(storage))
    }

    pub fn shared_storage(storage: Arc<dyn Storage>) -> Self {
        Component::Storage(storage)
    }

    pub fn group(components: impl IntoIterator<Item = Component>) -> Self {
        Component::Group(components.into_iter().collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Component::Handler(_) => "handler",
            Component::Storage(_) => "storage",
            Component::Group(_) => "group",
        }
    }
}

impl From<Box<dyn Handler>> for Component {
    fn from(handler: Box<dyn Handler>) -> Self {
        Component::Handler(handler)
    }
}

impl From<Arc<dyn Storage>> for Component {
    fn from(storage: Arc<dyn Storage>) -> Self {
        Component::Storage(storage)
    }
}

impl From<Vec<Component>> for Component {
    fn from(components: Vec<Component>) -> Self {
        Component::Group(components)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Handler(handler) => f
                .debug_tuple("Handler")
                .field(&handler.handler_type())
                .finish(),
            Component::Storage(storage) => {
                f.debug_tuple("Storage").field(&storage.format()).finish()
            }
            Component::Group(items) => f.debug_tuple("Group").field(items).finish(),
        }
    }
}
