//! Persistence gateway: the shared store a drawing is pushed to and mirrored from.
//!
//! A gateway holds whole values at slash-separated paths. Subscribers are
//! called once with the current value when they subscribe, then again after
//! every write to that path, including the subscriber's own writes. Writing
//! `null` or an empty collection removes the value.
//!
//! [`MemoryGateway`] keeps everything in process and backs the tests and the
//! offline build; [`crate::net::WsGateway`] talks to the store server.

#[cfg(test)]
#[path = "gateway_test.rs"]
mod gateway_test;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

/// Callback receiving the value at a path; `None` when nothing is stored.
pub type SnapshotCallback = Box<dyn FnMut(Option<&Value>)>;

/// Handle returned by [`Gateway::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid store path: {0:?}")]
    InvalidPath(String),
    #[error("store connection is closed")]
    Closed,
    #[error(transparent)]
    Codec(#[from] frames::CodecError),
    #[error("transport error: {0}")]
    Transport(String),
}

pub trait Gateway {
    /// Start receiving the value at `path`.
    ///
    /// # Errors
    ///
    /// Fails for invalid paths or when the request cannot be sent.
    fn subscribe(&self, path: &str, callback: SnapshotCallback) -> Result<SubscriptionId, GatewayError>;

    /// Stop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Overwrite the value at `path`.
    ///
    /// # Errors
    ///
    /// Fails for invalid paths or when the write cannot be sent.
    fn set(&self, path: &str, value: Value) -> Result<(), GatewayError>;
}

pub(crate) type SharedCallback = Rc<RefCell<SnapshotCallback>>;

/// Invoke a subscriber, skipping it if it is already running further up the stack.
pub(crate) fn deliver(callback: &SharedCallback, value: Option<&Value>) {
    match callback.try_borrow_mut() {
        Ok(mut callback) => callback(value),
        Err(_) => warn!("subscriber re-entered during delivery; skipped"),
    }
}

pub(crate) fn check_path(path: &str) -> Result<(), GatewayError> {
    if frames::is_valid_path(path) {
        Ok(())
    } else {
        Err(GatewayError::InvalidPath(path.to_owned()))
    }
}

// =============================================================================
// MEMORY GATEWAY
// =============================================================================

struct MemorySubscriber {
    path: String,
    callback: SharedCallback,
}

#[derive(Default)]
struct MemoryStore {
    values: HashMap<String, Value>,
    subscribers: BTreeMap<SubscriptionId, MemorySubscriber>,
    next_id: u64,
    writes: usize,
}

/// In-process gateway. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    store: Rc<RefCell<MemoryStore>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        self.store.borrow().values.get(path).cloned()
    }

    /// Number of writes accepted so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.store.borrow().writes
    }

    #[must_use]
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.store.borrow().subscribers.values().filter(|s| s.path == path).count()
    }

    fn notify(&self, path: &str) {
        let (value, callbacks) = {
            let store = self.store.borrow();
            let callbacks = store
                .subscribers
                .values()
                .filter(|s| s.path == path)
                .map(|s| Rc::clone(&s.callback))
                .collect::<Vec<_>>();
            (store.values.get(path).cloned(), callbacks)
        };
        for callback in &callbacks {
            deliver(callback, value.as_ref());
        }
    }
}

impl Gateway for MemoryGateway {
    fn subscribe(&self, path: &str, callback: SnapshotCallback) -> Result<SubscriptionId, GatewayError> {
        check_path(path)?;
        let callback = Rc::new(RefCell::new(callback));
        let (id, value) = {
            let mut store = self.store.borrow_mut();
            store.next_id += 1;
            let id = SubscriptionId(store.next_id);
            store.subscribers.insert(id, MemorySubscriber { path: path.to_owned(), callback: Rc::clone(&callback) });
            (id, store.values.get(path).cloned())
        };
        debug!(path, id = id.0, "memory subscription added");
        deliver(&callback, value.as_ref());
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.store.borrow_mut().subscribers.remove(&id).is_some() {
            debug!(id = id.0, "memory subscription removed");
        }
    }

    fn set(&self, path: &str, value: Value) -> Result<(), GatewayError> {
        check_path(path)?;
        {
            let mut store = self.store.borrow_mut();
            match frames::normalize_value(value) {
                Some(value) => store.values.insert(path.to_owned(), value),
                None => store.values.remove(path),
            };
            store.writes += 1;
        }
        self.notify(path);
        Ok(())
    }
}
