//! Durable storage for the compared set
//!
//! The set is persisted as a single named record holding a JSON array of
//! `{item_id, added_at}` entries. Writes are whole-record replacements.

use keybed_common::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::CompareEntry;

/// Backing store for the persisted compare record
pub trait CompareStorage: Send + Sync {
    /// Read the persisted record
    ///
    /// `Ok(None)` when nothing has been persisted yet. A record that exists
    /// but cannot be parsed is an `Err`.
    fn load(&self) -> Result<Option<Vec<CompareEntry>>>;

    /// Replace the persisted record with `entries`
    fn save(&self, entries: &[CompareEntry]) -> Result<()>;
}

/// JSON file in the root folder, written atomically (temp file + rename)
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CompareStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<Vec<CompareEntry>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn save(&self, entries: &[CompareEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process storage
///
/// Clones share the same record, so a test can keep a handle and inspect
/// what the store persisted. Writes can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    record: Arc<Mutex<Option<String>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a raw record, valid or not
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let storage = Self::default();
        *storage.lock() = Some(raw.into());
        storage
    }

    /// Raw persisted record
    pub fn raw(&self) -> Option<String> {
        self.lock().clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CompareStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Vec<CompareEntry>>> {
        match self.lock().as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, entries: &[CompareEntry]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("simulated write failure").into());
        }
        *self.lock() = Some(serde_json::to_string(entries)?);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
