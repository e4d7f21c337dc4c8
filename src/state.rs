//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds a map of live paths. Each path has its current value, a version
//! counter, a dirty flag for debounced persistence, and the outbound queues
//! of the connections subscribed to it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use frames::Frame;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;

// =============================================================================
// PATH STATE
// =============================================================================

/// Live state of one store path.
#[derive(Debug, Default)]
pub struct PathState {
    /// Current value. `None` means nothing is stored.
    pub value: Option<Value>,
    /// Bumped on every write. Lets the flusher detect writes that raced it.
    pub version: u64,
    /// Written since the last successful flush.
    pub dirty: bool,
    /// Subscribed connections: `client_id` -> sender for outgoing frames.
    pub subscribers: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl PathState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_value(value: Option<Value>) -> Self {
        Self { value, ..Self::default() }
    }

    /// Nothing stored, nothing pending, nobody listening: safe to drop from memory.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.value.is_none() && !self.dirty && self.subscribers.is_empty()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<RwLock<HashMap<String, PathState>>>,
    /// Snapshot directory. `None` disables persistence.
    pub data_dir: Option<PathBuf>,
    /// Outbound queue capacity per connection.
    pub client_queue: usize,
}

impl AppState {
    #[must_use]
    pub fn new(data_dir: Option<PathBuf>, client_queue: usize) -> Self {
        Self { paths: Arc::new(RwLock::new(HashMap::new())), data_dir, client_queue: client_queue.max(1) }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_dir.clone(), config.client_queue)
    }

    #[must_use]
    pub fn persists(&self) -> bool {
        self.data_dir.is_some()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
