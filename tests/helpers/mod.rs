#![allow(dead_code)]

use std::path::PathBuf;

use engram::config::StorageConfig;
use engram::memory::store::{MemoryStore, INDEX_FILE, RECORDS_DIR};
use engram::memory::types::{MemoryDraft, MemoryType};
use tempfile::TempDir;

/// Open a fresh store rooted in a temp directory. The dir guard must stay
/// alive for the duration of the test.
pub async fn test_store() -> (TempDir, MemoryStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(&storage_config(&dir)).await.unwrap();
    (dir, store)
}

pub fn storage_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        data_dir: dir.path().to_string_lossy().into_owned(),
    }
}

/// Minimal draft with a fixed test author.
pub fn draft(
    content: &str,
    summary: &str,
    memory_type: MemoryType,
    confidence: f64,
) -> MemoryDraft {
    MemoryDraft::new(content, summary, memory_type, confidence, "test-agent")
}

/// Resolve a memory's record file through the documented on-disk contract:
/// the index file maps id → location relative to the records directory.
pub fn record_path(dir: &TempDir, id: &str) -> PathBuf {
    let raw = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
    let index: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let location = index["entries"][id]["location"]
        .as_str()
        .unwrap_or_else(|| panic!("id not in index: {id}"))
        .to_string();
    dir.path().join(RECORDS_DIR).join(location)
}

/// Edit a stored record's raw JSON in place — the same thing an external tool
/// could do through the stable layout. Used to backdate timestamps and plant
/// counter values the public API derives on its own.
pub fn rewrite_record(dir: &TempDir, id: &str, edit: impl FnOnce(&mut serde_json::Value)) {
    let path = record_path(dir, id);
    let mut value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    edit(&mut value);
    std::fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}
