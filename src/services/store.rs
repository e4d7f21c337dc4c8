//! Store service: subscribe, read and overwrite values at paths.
//!
//! DESIGN
//! ======
//! Values are opaque JSON replaced wholesale on every `set`; the store never
//! merges. After each write the new value is pushed as a `store:value` frame
//! to every subscriber of the path except the writer, which has already
//! applied its own write. All clients converge on the last write. Pushes use `try_send`: a subscriber whose
//! queue is full misses that push (it will catch up on the next one) and a
//! closed queue is dropped from the path.

use std::collections::HashSet;

use frames::{ErrorCode, Frame};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{AppState, PathState};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown store syscall: {0}")]
    UnknownSyscall(String),
    #[error("path required")]
    MissingPath,
    #[error("invalid store path: {0:?}")]
    InvalidPath(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
            Self::MissingPath => "E_MISSING_PATH",
            Self::InvalidPath(_) => "E_INVALID_PATH",
        }
    }
}

/// Validate the path carried by a request frame.
///
/// # Errors
///
/// Returns [`StoreError::MissingPath`] when absent and
/// [`StoreError::InvalidPath`] when it fails [`frames::is_valid_path`].
pub fn require_path(path: Option<&str>) -> Result<&str, StoreError> {
    let path = path.ok_or(StoreError::MissingPath)?;
    if frames::is_valid_path(path) {
        Ok(path)
    } else {
        Err(StoreError::InvalidPath(path.to_owned()))
    }
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Register `client_id` on `path` and return the current value.
///
/// Registration and the read happen under one lock, so any write after this
/// call is delivered through `tx`. Subscribing again replaces the sender.
pub async fn subscribe(state: &AppState, path: &str, client_id: Uuid, tx: mpsc::Sender<Frame>) -> Option<Value> {
    let mut paths = state.paths.write().await;
    let path_state = paths.entry(path.to_owned()).or_insert_with(PathState::new);
    path_state.subscribers.insert(client_id, tx);
    info!(path, %client_id, subscribers = path_state.subscribers.len(), "client subscribed");
    path_state.value.clone()
}

/// Remove `client_id` from `path`. Returns whether it was subscribed.
pub async fn unsubscribe(state: &AppState, path: &str, client_id: Uuid) -> bool {
    let mut paths = state.paths.write().await;
    let Some(path_state) = paths.get_mut(path) else {
        return false;
    };
    let removed = path_state.subscribers.remove(&client_id).is_some();
    if removed {
        info!(path, %client_id, remaining = path_state.subscribers.len(), "client unsubscribed");
    }
    if path_state.is_idle() {
        paths.remove(path);
    }
    removed
}

/// Drop every subscription a disconnecting client held.
pub async fn unsubscribe_all(state: &AppState, client_id: Uuid, subscribed: &HashSet<String>) {
    let mut paths = state.paths.write().await;
    for path in subscribed {
        let Some(path_state) = paths.get_mut(path) else {
            continue;
        };
        path_state.subscribers.remove(&client_id);
        if path_state.is_idle() {
            paths.remove(path);
        }
    }
    debug!(%client_id, count = subscribed.len(), "client subscriptions released");
}

// =============================================================================
// VALUES
// =============================================================================

/// Current value at `path`.
pub async fn get(state: &AppState, path: &str) -> Option<Value> {
    let paths = state.paths.read().await;
    paths.get(path).and_then(|ps| ps.value.clone())
}

/// Overwrite the value at `path` and push it to every subscriber but `writer`.
///
/// `null`, `[]` and `{}` delete the value. Returns the path's new version.
pub async fn set(state: &AppState, path: &str, value: Value, writer: Option<Uuid>) -> u64 {
    let value = frames::normalize_value(value);
    let mut paths = state.paths.write().await;
    let path_state = paths.entry(path.to_owned()).or_insert_with(PathState::new);

    path_state.value = value;
    path_state.version += 1;
    path_state.dirty = state.persists();

    let push = value_frame(path, path_state.value.as_ref());
    let mut closed = Vec::new();
    for (client_id, tx) in &path_state.subscribers {
        if writer == Some(*client_id) {
            continue;
        }
        match tx.try_send(push.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(path, %client_id, "client queue full; dropping store:value push");
            }
            Err(TrySendError::Closed(_)) => closed.push(*client_id),
        }
    }
    for client_id in closed {
        path_state.subscribers.remove(&client_id);
        debug!(path, %client_id, "removed closed subscriber");
    }

    let version = path_state.version;
    debug!(path, version, stored = path_state.value.is_some(), subscribers = path_state.subscribers.len(), "value set");
    if path_state.is_idle() {
        paths.remove(path);
    }
    version
}

/// Server push carrying the value at `path` (`null` when nothing is stored).
#[must_use]
pub fn value_frame(path: &str, value: Option<&Value>) -> Frame {
    Frame::request(frames::STORE_VALUE)
        .with_path(path)
        .with_data(frames::FRAME_VALUE, value.cloned().unwrap_or(Value::Null))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
