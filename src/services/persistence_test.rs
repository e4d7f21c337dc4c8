use super::*;
use crate::services::store;
use crate::state::test_helpers;
use serde_json::json;

fn drawing() -> Value {
    json!([{"stroke": "blue", "strokeWidth": 2, "data": [{"x": 1, "y": 2}]}])
}

async fn read_file(dir: &Path, path: &str) -> Option<Value> {
    let bytes = tokio::fs::read(dir.join(file_name(path))).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

// =============================================================================
// file_name
// =============================================================================

#[test]
fn file_name_replaces_separators() {
    assert_eq!(file_name("points"), "points.json");
    assert_eq!(file_name("boards/a-1/points"), "boards.a-1.points.json");
}

// =============================================================================
// write_snapshot
// =============================================================================

#[tokio::test]
async fn write_snapshot_creates_envelope_file() {
    let dir = test_helpers::temp_data_dir("write");
    write_snapshot(&dir, "points", Some(&drawing())).await.unwrap();
    assert_eq!(read_file(&dir, "points").await, Some(json!({"path": "points", "value": drawing()})));
    assert!(!dir.join("points.json.tmp").exists());
}

#[tokio::test]
async fn write_snapshot_absent_value_removes_file() {
    let dir = test_helpers::temp_data_dir("remove");
    write_snapshot(&dir, "points", Some(&drawing())).await.unwrap();
    write_snapshot(&dir, "points", None).await.unwrap();
    assert!(!dir.join("points.json").exists());
    // removing again is fine
    write_snapshot(&dir, "points", None).await.unwrap();
}

#[tokio::test]
async fn write_snapshot_into_missing_dir_fails() {
    let dir = std::env::temp_dir().join(format!("sketchboard-missing-{}", uuid::Uuid::new_v4()));
    let err = write_snapshot(&dir, "points", Some(&drawing())).await.unwrap_err();
    assert!(matches!(err, PersistError::Io { .. }));
}

// =============================================================================
// flush_all_dirty
// =============================================================================

#[tokio::test]
async fn flush_without_data_dir_is_noop() {
    let state = test_helpers::test_app_state();
    store::set(&state, "points", drawing(), None).await;
    assert_eq!(flush_all_dirty(&state).await, 0);
}

#[tokio::test]
async fn flush_writes_dirty_paths_and_clears_flags() {
    let dir = test_helpers::temp_data_dir("flush");
    let state = test_helpers::test_app_state_in(dir.clone());
    store::set(&state, "points", drawing(), None).await;
    store::set(&state, "boards/b/points", json!([1]), None).await;

    assert_eq!(flush_all_dirty(&state).await, 2);
    assert_eq!(read_file(&dir, "points").await.map(|v| v["value"].clone()), Some(drawing()));
    assert!(dir.join("boards.b.points.json").exists());
    assert!(state.paths.read().await.values().all(|ps| !ps.dirty));

    // nothing left to do
    assert_eq!(flush_all_dirty(&state).await, 0);
}

#[tokio::test]
async fn flush_of_cleared_path_removes_file_and_evicts() {
    let dir = test_helpers::temp_data_dir("clear");
    let state = test_helpers::test_app_state_in(dir.clone());
    store::set(&state, "points", drawing(), None).await;
    flush_all_dirty(&state).await;

    store::set(&state, "points", Value::Null, None).await;
    assert!(state.paths.read().await["points"].dirty);
    flush_all_dirty(&state).await;

    assert!(!dir.join("points.json").exists());
    assert!(!state.paths.read().await.contains_key("points"));
}

#[tokio::test]
async fn newer_write_keeps_dirty_flag() {
    let dir = test_helpers::temp_data_dir("race");
    let state = test_helpers::test_app_state_in(dir);
    store::set(&state, "points", json!([1]), None).await;
    store::set(&state, "points", json!([2]), None).await;

    // Ack an older version: the flag must survive.
    clear_flushed(&state, &[("points".to_owned(), 1)]).await;
    assert!(state.paths.read().await["points"].dirty);

    clear_flushed(&state, &[("points".to_owned(), 2)]).await;
    assert!(!state.paths.read().await["points"].dirty);
}

#[tokio::test]
async fn failed_write_keeps_dirty_flag() {
    let dir = std::env::temp_dir().join(format!("sketchboard-gone-{}", uuid::Uuid::new_v4()));
    let state = test_helpers::test_app_state_in(dir);
    store::set(&state, "points", drawing(), None).await;
    assert_eq!(flush_all_dirty(&state).await, 0);
    assert!(state.paths.read().await["points"].dirty);
}

// =============================================================================
// load_all
// =============================================================================

#[tokio::test]
async fn load_all_without_data_dir_loads_nothing() {
    let state = test_helpers::test_app_state();
    assert_eq!(load_all(&state).await.unwrap(), 0);
}

#[tokio::test]
async fn load_all_restores_flushed_values() {
    let dir = test_helpers::temp_data_dir("reload");
    let before = test_helpers::test_app_state_in(dir.clone());
    store::set(&before, "points", drawing(), None).await;
    store::set(&before, "boards/b/points", json!([1]), None).await;
    flush_all_dirty(&before).await;

    let after = test_helpers::test_app_state_in(dir);
    assert_eq!(load_all(&after).await.unwrap(), 2);
    assert_eq!(store::get(&after, "points").await, Some(drawing()));
    assert_eq!(store::get(&after, "boards/b/points").await, Some(json!([1])));
    assert!(after.paths.read().await.values().all(|ps| !ps.dirty && ps.version == 0));
}

#[tokio::test]
async fn load_all_skips_bad_files() {
    let dir = test_helpers::temp_data_dir("bad");
    tokio::fs::write(dir.join("garbage.json"), b"{not json").await.unwrap();
    tokio::fs::write(dir.join("evil.json"), br#"{"path": "../x", "value": [1]}"#).await.unwrap();
    tokio::fs::write(dir.join("empty.json"), br#"{"path": "empty", "value": []}"#).await.unwrap();
    tokio::fs::write(dir.join("notes.txt"), b"ignored").await.unwrap();
    write_snapshot(&dir, "points", Some(&drawing())).await.unwrap();

    let state = test_helpers::test_app_state_in(dir);
    assert_eq!(load_all(&state).await.unwrap(), 1);
    assert_eq!(state.paths.read().await.len(), 1);
}

#[tokio::test]
async fn load_all_creates_missing_dir() {
    let dir = std::env::temp_dir().join(format!("sketchboard-new-{}", uuid::Uuid::new_v4()));
    let state = test_helpers::test_app_state_in(dir.clone());
    assert_eq!(load_all(&state).await.unwrap(), 0);
    assert!(dir.is_dir());
}
