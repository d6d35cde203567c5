//! Local record stores: where sealed records live between sessions.
//!
//! One record per user; a new `put` replaces the previous one
//! (last writer wins).

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::BackupError;
use crate::record::BackupRecord;

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Backend for persisting sealed records.
///
/// Implementations never see a plaintext DEK, only `BackupRecord`s.
pub trait RecordStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<BackupRecord>, BackupError>;
    fn put(&self, record: &BackupRecord) -> Result<(), BackupError>;
    fn delete(&self, user_id: &str) -> Result<(), BackupError>;
    fn list(&self) -> Result<Vec<BackupRecord>, BackupError>;
}

fn poisoned<T>(_: T) -> BackupError {
    BackupError::Storage("lock poisoned".into())
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, BackupRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn get(&self, user_id: &str) -> Result<Option<BackupRecord>, BackupError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(user_id).cloned())
    }

    fn put(&self, record: &BackupRecord) -> Result<(), BackupError> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), BackupError> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.remove(user_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// File backend
// ---------------------------------------------------------------------------

/// One JSON file per user.
///
/// Directory layout:
/// ```text
/// records/
///   {hex(user_id)}.json
/// ```
/// The user id is hex-encoded in the file name so arbitrary ids cannot
/// escape the directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, BackupError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| BackupError::Storage(format!("create dir: {}", e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(user_id)))
    }

    fn read_record_file(&self, path: &Path) -> Result<BackupRecord, BackupError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| BackupError::Storage(format!("read: {}", e)))?;
        serde_json::from_str(&data).map_err(|e| BackupError::Storage(format!("parse: {}", e)))
    }
}

impl RecordStore for FileStore {
    fn get(&self, user_id: &str) -> Result<Option<BackupRecord>, BackupError> {
        let path = self.record_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_record_file(&path).map(Some)
    }

    fn put(&self, record: &BackupRecord) -> Result<(), BackupError> {
        let path = self.record_path(&record.user_id);
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| BackupError::Storage(format!("serialize: {}", e)))?;
        // Atomic write: unique temp file per writer, then rename. The temp
        // file is removed on drop if either step fails.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| BackupError::Storage(format!("create temp: {}", e)))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| BackupError::Storage(format!("write: {}", e)))?;
        tmp.persist(&path)
            .map_err(|e| BackupError::Storage(format!("rename: {}", e.error)))?;
        tracing::debug!(user_id = %record.user_id, path = %path.display(), "record stored");
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), BackupError> {
        let path = self.record_path(user_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| BackupError::Storage(format!("delete: {}", e)))?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<BackupRecord>, BackupError> {
        let mut records = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| BackupError::Storage(format!("readdir: {}", e)))?;
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::Storage(format!("entry: {}", e)))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                records.push(self.read_record_file(&path)?);
            }
        }
        Ok(records)
    }
}
