//! Key-value persistence for client identity
//!
//! A small string-to-string store with the semantics of browser local
//! storage. [`FileStore`] keeps a JSON object on disk and is loaded lazily;
//! [`MemoryStore`] lives only as long as the process.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use crate::constants::{paths, storage};
use crate::error::{MenupiError, Result};

/// Persistent string key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// Session-only store; also counts writes so callers can verify write-once paths
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

// ============================================================================
// File Store
// ============================================================================

/// JSON-object store on disk, written atomically on every change
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    /// Store at the default location in the user config directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(get_store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No identity store found, starting empty");
            return Ok(BTreeMap::new());
        }

        let metadata = fs::metadata(&self.path).map_err(|source| MenupiError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        if metadata.len() > storage::MAX_STORE_SIZE {
            return Err(MenupiError::FileTooLarge {
                path: self.path.clone(),
                size: metadata.len(),
                max_size: storage::MAX_STORE_SIZE,
            });
        }

        let content = fs::read_to_string(&self.path).map_err(|source| MenupiError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| MenupiError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");
        let write_err = |source| MenupiError::FileWrite {
            path: temp_path.clone(),
            source,
        };

        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|source| MenupiError::FileWrite {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = ?self.path, keys = entries.len(), "Saved identity store");
        Ok(())
    }

    /// Run `f` against the loaded entries, loading from disk on first use
    fn with_entries<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> Result<T> {
        let mut guard = self.entries.lock();
        if guard.is_none() {
            *guard = Some(self.load()?);
        }
        match guard.as_mut() {
            Some(entries) => Ok(f(entries)),
            None => Err(MenupiError::storage("identity store not loaded")),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        })?;
        self.persist(&snapshot)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let snapshot = self.with_entries(|entries| entries.remove(key).map(|_| entries.clone()))?;
        match snapshot {
            Some(entries) => self.persist(&entries),
            None => Ok(()),
        }
    }
}

/// Default identity store path
pub fn get_store_path() -> Result<PathBuf> {
    let config_dir = paths::user_config_dir()
        .ok_or_else(|| MenupiError::config("Could not determine config directory"))?;
    Ok(config_dir.join(paths::STORE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.writes(), 1);
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let store = FileStore::new(&path);
        store.set("menupi_device_uid", "abc").unwrap();
        store.set("menupi_installation_id", "def").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("menupi_device_uid").unwrap().as_deref(), Some("abc"));
        reopened.remove("menupi_installation_id").unwrap();

        let third = FileStore::new(&path);
        assert_eq!(third.get("menupi_installation_id").unwrap(), None);
        assert_eq!(third.get("menupi_device_uid").unwrap().as_deref(), Some("abc"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.get("k"), Err(MenupiError::JsonParse(_))));
    }

    #[test]
    fn test_file_store_empty_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "").unwrap();
        assert_eq!(FileStore::new(&path).get("k").unwrap(), None);
    }
}
