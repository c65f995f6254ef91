//! Durable key-value storage and the workout persistence gateway.
//!
//! The whole store is written as one JSON blob under a fixed key and
//! overwritten on every save. Loading is forgiving: a record that fails to
//! decode is skipped and reported, never fatal. Whenever anything is skipped
//! the blob is first copied aside under a backup key, so the next save can
//! never destroy data that was merely unreadable.

use crate::codec::{self, WorkoutRecord};
use crate::{Error, Result, Workout, WorkoutStore};
use chrono::Utc;
use fs2::FileExt;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Key the workout blob is stored under
pub const WORKOUTS_KEY: &str = "workouts";

/// Durable storage collaborator
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

// ============================================================================
// File-backed storage
// ============================================================================

/// One `<key>.json` file per key inside a directory.
///
/// Each key also has a `<key>.lock` file: readers hold it shared and writers
/// hold it exclusively, so a reader never sees a half-replaced value and two
/// writers never race on the rename.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock_for(&self, key: &str) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(format!("{}.lock", key)))?;
        Ok(file)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let lock = self.lock_for(key)?;
        lock.lock_shared()?;

        let mut contents = String::new();
        let read = File::open(&path)
            .and_then(|file| std::io::BufReader::new(file).read_to_string(&mut contents));
        lock.unlock()?;
        read?;

        tracing::debug!("Read {} bytes from {:?}", contents.len(), path);
        Ok(Some(contents))
    }

    /// Atomically replaces the value by writing a temp file in the same
    /// directory, syncing it, then renaming it over the original.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(value.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        let lock = self.lock_for(key)?;
        lock.lock_exclusive()?;
        let persisted = temp.persist(&path).map_err(|e| Error::Io(e.error));
        lock.unlock()?;
        persisted?;

        tracing::debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(());
        }
        let lock = self.lock_for(key)?;
        lock.lock_exclusive()?;
        let removed = std::fs::remove_file(&path);
        lock.unlock()?;
        match removed {
            Ok(()) => {
                tracing::debug!("Removed {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory storage
// ============================================================================

/// Process-local storage, for tests and throwaway sessions
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key currently set, in no particular order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// A record that could not be restored
#[derive(Clone, Debug, PartialEq)]
pub struct RecordFailure {
    /// Position in the stored array; `None` when the blob itself is unreadable
    pub index: Option<usize>,
    pub reason: String,
}

/// Outcome of [`Gateway::load`]
#[derive(Debug, Default)]
pub struct LoadReport {
    pub workouts: Vec<Workout>,
    pub failures: Vec<RecordFailure>,
    /// Key the original blob was copied to because something was skipped
    pub backup_key: Option<String>,
}

impl LoadReport {
    /// Some stored records were skipped
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Bulk save/load of the workout store through the codec
pub struct Gateway<K: KeyValueStore> {
    storage: K,
}

impl<K: KeyValueStore> Gateway<K> {
    pub fn new(storage: K) -> Self {
        Self { storage }
    }

    /// Encode every workout and overwrite the stored blob
    pub fn save(&mut self, store: &WorkoutStore) -> Result<()> {
        let records: Vec<WorkoutRecord> = store.iter().map(codec::encode).collect();
        let blob = serde_json::to_string(&records)?;
        self.storage.set(WORKOUTS_KEY, &blob)?;
        tracing::debug!("Saved {} workouts", records.len());
        Ok(())
    }

    /// Read back the stored workouts.
    ///
    /// An absent key is an empty log. Individual records that fail to decode,
    /// or repeat an id already loaded, are skipped and listed in the report.
    /// If anything was skipped the untouched blob is backed up first.
    pub fn load(&mut self) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        let Some(blob) = self.storage.get(WORKOUTS_KEY)? else {
            tracing::info!("No saved workouts found, starting empty");
            return Ok(report);
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&blob) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!("Saved workouts are unreadable: {}. Starting empty.", e);
                report.failures.push(RecordFailure {
                    index: None,
                    reason: e.to_string(),
                });
                report.backup_key = Some(self.back_up(&blob)?);
                return Ok(report);
            }
        };

        let mut seen = HashSet::new();
        for (index, value) in values.into_iter().enumerate() {
            let outcome = codec::decode_value(value).and_then(|w| {
                if seen.insert(w.id().clone()) {
                    Ok(w)
                } else {
                    Err(Error::DuplicateId(w.id().clone()))
                }
            });

            match outcome {
                Ok(workout) => report.workouts.push(workout),
                Err(e) => {
                    tracing::warn!("Skipping saved workout #{}: {}", index, e);
                    report.failures.push(RecordFailure {
                        index: Some(index),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if report.is_partial() {
            report.backup_key = Some(self.back_up(&blob)?);
        }

        tracing::info!(
            "Loaded {} workouts ({} skipped)",
            report.workouts.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Erase every saved workout
    pub fn clear(&mut self) -> Result<()> {
        self.storage.remove(WORKOUTS_KEY)?;
        tracing::info!("Cleared saved workouts");
        Ok(())
    }

    /// Copy a blob that could not be fully restored to a timestamped key
    fn back_up(&mut self, blob: &str) -> Result<String> {
        let key = format!(
            "{}.corrupt-{}",
            WORKOUTS_KEY,
            Utc::now().format("%Y%m%dT%H%M%S%.3f")
        );
        self.storage.set(&key, blob)?;
        tracing::warn!("Kept a copy of the unreadable saved workouts under {:?}", key);
        Ok(key)
    }

    pub fn storage(&self) -> &K {
        &self.storage
    }

    pub fn into_inner(self) -> K {
        self.storage
    }
}
