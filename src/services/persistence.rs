//! Persistence service: snapshot files for store paths.
//!
//! DESIGN
//! ======
//! Each path with a value is one JSON file in `DATA_DIR`, named after the
//! path with `/` replaced by `.` (`boards/a/points` → `boards.a.points.json`).
//! Files are loaded once at startup. A background task wakes every flush
//! interval, snapshots dirty paths under the lock, writes them without the
//! lock, then clears the dirty flags it wrote.
//!
//! ERROR HANDLING
//! ==============
//! Dirty flags are cleared only after a successful write, and only if the
//! path was not written again in the meantime. Failed writes are logged and
//! retried on the next tick. Writes go to a temp file first and are renamed
//! into place, so a crash never leaves a half-written snapshot.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::state::{AppState, PathState};

const SNAPSHOT_EXT: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot {} names invalid store path {stored:?}", path.display())]
    InvalidPath { path: PathBuf, stored: String },
}

impl PersistError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// On-disk envelope. Carries the path so files are self-describing.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    path: String,
    value: Value,
}

/// File name holding the snapshot of `path`.
#[must_use]
pub fn file_name(path: &str) -> String {
    format!("{}.{SNAPSHOT_EXT}", path.replace('/', "."))
}

// =============================================================================
// LOAD
// =============================================================================

/// Load every snapshot file in the data directory into `state`.
///
/// Creates the directory if needed. Unreadable or malformed files are logged
/// and skipped. Returns the number of paths loaded.
///
/// # Errors
///
/// Returns [`PersistError::Io`] if the directory cannot be created or listed.
pub async fn load_all(state: &AppState) -> Result<usize, PersistError> {
    let Some(dir) = state.data_dir.as_deref() else {
        return Ok(0);
    };
    tokio::fs::create_dir_all(dir).await.map_err(|e| PersistError::io(dir, e))?;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| PersistError::io(dir, e))?;

    let mut loaded = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| PersistError::io(dir, e))? {
        let file = entry.path();
        if file.extension().is_none_or(|ext| ext != SNAPSHOT_EXT) {
            continue;
        }
        match read_snapshot(&file).await {
            Ok(Some((path, value))) => loaded.push((path, value)),
            Ok(None) => debug!(file = %file.display(), "empty snapshot skipped"),
            Err(e) => warn!(error = %e, "snapshot skipped"),
        }
    }

    let count = loaded.len();
    let mut paths = state.paths.write().await;
    for (path, value) in loaded {
        paths.insert(path, PathState::with_value(Some(value)));
    }
    info!(dir = %dir.display(), count, "snapshots loaded");
    Ok(count)
}

async fn read_snapshot(file: &Path) -> Result<Option<(String, Value)>, PersistError> {
    let bytes = tokio::fs::read(file).await.map_err(|e| PersistError::io(file, e))?;
    let snapshot: SnapshotFile =
        serde_json::from_slice(&bytes).map_err(|source| PersistError::Json { path: file.to_path_buf(), source })?;
    if !frames::is_valid_path(&snapshot.path) {
        return Err(PersistError::InvalidPath { path: file.to_path_buf(), stored: snapshot.path });
    }
    Ok(frames::normalize_value(snapshot.value).map(|value| (snapshot.path, value)))
}

// =============================================================================
// FLUSH
// =============================================================================

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState, interval: Duration) -> JoinHandle<()> {
    info!(interval_ms = interval.as_millis(), "snapshot flush configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            flush_all_dirty(&state).await;
        }
    })
}

#[derive(Debug)]
struct DirtyPath {
    path: String,
    value: Option<Value>,
    version: u64,
}

/// Write every dirty path. Returns how many were written successfully.
pub async fn flush_all_dirty(state: &AppState) -> usize {
    let Some(dir) = state.data_dir.as_deref() else {
        return 0;
    };

    // PHASE: SNAPSHOT DIRTY PATHS
    // WHY: collect immutable clones under lock, then perform I/O lock-free.
    let batch = {
        let paths = state.paths.read().await;
        paths
            .iter()
            .filter(|(_, ps)| ps.dirty)
            .map(|(path, ps)| DirtyPath { path: path.clone(), value: ps.value.clone(), version: ps.version })
            .collect::<Vec<_>>()
    };
    if batch.is_empty() {
        return 0;
    }

    // PHASE: WRITE + ACK
    // WHY: if a write fails we intentionally keep the dirty flag for retry.
    let results = futures::future::join_all(batch.iter().map(|dirty| write_snapshot(dir, &dirty.path, dirty.value.as_ref()))).await;

    let mut flushed = Vec::new();
    for (dirty, result) in batch.into_iter().zip(results) {
        match result {
            Ok(()) => flushed.push((dirty.path, dirty.version)),
            Err(e) => error!(error = %e, path = %dirty.path, "snapshot flush failed"),
        }
    }
    clear_flushed(state, &flushed).await;
    debug!(count = flushed.len(), "snapshots flushed");
    flushed.len()
}

async fn clear_flushed(state: &AppState, flushed: &[(String, u64)]) {
    let mut paths = state.paths.write().await;
    for (path, version) in flushed {
        let Some(ps) = paths.get_mut(path) else {
            continue;
        };
        // EDGE: keep the dirty flag if the path was written again after the snapshot.
        if ps.version == *version {
            ps.dirty = false;
        }
        if ps.is_idle() {
            paths.remove(path);
        }
    }
}

/// Write (or remove, for an absent value) the snapshot file of `path`.
///
/// # Errors
///
/// Returns [`PersistError`] when serialization or any filesystem step fails.
pub async fn write_snapshot(dir: &Path, path: &str, value: Option<&Value>) -> Result<(), PersistError> {
    let target = dir.join(file_name(path));
    let Some(value) = value else {
        return match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistError::io(&target, e)),
        };
    };

    let snapshot = SnapshotFile { path: path.to_owned(), value: value.clone() };
    let bytes = serde_json::to_vec(&snapshot).map_err(|source| PersistError::Json { path: target.clone(), source })?;
    let temp = target.with_extension(format!("{SNAPSHOT_EXT}.tmp"));
    tokio::fs::write(&temp, &bytes).await.map_err(|e| PersistError::io(&temp, e))?;
    tokio::fs::rename(&temp, &target).await.map_err(|e| PersistError::io(&target, e))?;
    Ok(())
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
