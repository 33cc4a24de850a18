//! Durable Store
//!
//! Synchronous, string-keyed, JSON-valued persistence. `MemoryStore` keeps
//! values in process (clones share the same data); `FileStore` keeps one JSON
//! document per key under a directory so records survive restarts.
//! `RecordingStore` wraps the memory store for tests: it logs written keys
//! and fails reads or writes of chosen keys on request.

pub mod repository;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::errors::StorageError;

pub use repository::HangoutRepository;

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Key-value persistence used by the engine
pub trait DurableStore: Send {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the value stored under `key`
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError>;
}

// ----------------------------------------------------------------------------
// Memory Storage Implementation
// ----------------------------------------------------------------------------

/// In-memory store. Clones share the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Value>>, StorageError> {
        self.data.lock().map_err(|_| StorageError::NotAvailable)
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Recording Storage (test double)
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Recording {
    writes: Vec<String>,
    failing_reads: BTreeSet<String>,
    failing_writes: BTreeSet<String>,
}

/// Memory store that logs every written key and can be told to fail.
/// Clones share the data, the log and the failure rules.
#[derive(Debug, Clone, Default)]
pub struct RecordingStore {
    data: MemoryStore,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Recording>, StorageError> {
        self.recording.lock().map_err(|_| StorageError::NotAvailable)
    }

    /// Keys written so far, in write order. Failed writes are not logged.
    pub fn write_log(&self) -> Vec<String> {
        self.lock().map(|r| r.writes.clone()).unwrap_or_default()
    }

    pub fn clear_write_log(&self) {
        if let Ok(mut recording) = self.lock() {
            recording.writes.clear();
        }
    }

    /// Every later read of `key` fails as a corrupt value
    pub fn fail_reads_of(&self, key: impl Into<String>) {
        if let Ok(mut recording) = self.lock() {
            recording.failing_reads.insert(key.into());
        }
    }

    /// Every later write of `key` fails
    pub fn fail_writes_to(&self, key: impl Into<String>) {
        if let Ok(mut recording) = self.lock() {
            recording.failing_writes.insert(key.into());
        }
    }

    /// Drop all failure rules
    pub fn heal(&self) {
        if let Ok(mut recording) = self.lock() {
            recording.failing_reads.clear();
            recording.failing_writes.clear();
        }
    }
}

impl DurableStore for RecordingStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        if self.lock()?.failing_reads.contains(key) {
            return Err(StorageError::Corrupt {
                key: key.to_string(),
                reason: "read refused".to_string(),
            });
        }
        self.data.get(key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut recording = self
            .recording
            .lock()
            .map_err(|_| StorageError::NotAvailable)?;
        if recording.failing_writes.contains(key) {
            return Err(StorageError::Generic(format!("write to {key} refused")));
        }
        self.data.set(key, value)?;
        recording.writes.push(key.to_string());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File Storage Implementation
// ----------------------------------------------------------------------------

/// One `<key>.json` file per key under a data directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = key.is_empty()
            || key.starts_with('.')
            || key.contains(['/', '\\', '\0'])
            || key.contains("..");
        if invalid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{key}.json.tmp"));
        let raw = serde_json::to_vec(&value).map_err(|e| StorageError::Generic(e.to_string()))?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_store_clones_share_data() {
        let mut store = MemoryStore::new();
        let view = store.clone();

        store.set("alice-hangouts", json!([])).unwrap();
        assert_eq!(view.get("alice-hangouts").unwrap(), Some(json!([])));
        assert!(view.get("alice-unread-hangouts").unwrap().is_none());
    }

    #[test]
    fn test_recording_store_logs_and_fails_on_request() {
        let mut store = RecordingStore::new();
        let view = store.clone();

        store.set("alice-hangouts", json!([])).unwrap();
        view.fail_writes_to("alice-unread-hangouts");
        view.fail_reads_of("alice-hangouts");

        assert!(store.set("alice-unread-hangouts", json!([])).is_err());
        assert!(matches!(
            store.get("alice-hangouts"),
            Err(StorageError::Corrupt { .. })
        ));
        assert_eq!(view.write_log(), vec!["alice-hangouts".to_string()]);

        view.heal();
        store.set("alice-unread-hangouts", json!([1])).unwrap();
        assert_eq!(store.get("alice-hangouts").unwrap(), Some(json!([])));
        assert_eq!(view.write_log().len(), 2);
        view.clear_write_log();
        assert!(view.write_log().is_empty());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = FileStore::open(dir.path()).unwrap();
            store.set("alice-bob-messages", json!([{"text": "hi"}])).unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("alice-bob-messages").unwrap(),
            Some(json!([{"text": "hi"}]))
        );
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.set(key, json!(1)),
                Err(StorageError::InvalidKey { .. })
            ));
        }
    }

    #[test]
    fn test_file_store_reports_corrupt_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alice-hangouts.json"), "{not json").unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.get("alice-hangouts"),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
