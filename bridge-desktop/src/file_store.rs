//! Key-Value Storage backed by a JSON file

use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const STORE_FILE_NAME: &str = "session.json";

/// File-backed key-value store
///
/// Keeps every entry in a single JSON object on disk and an in-memory copy
/// behind a mutex. Every mutation rewrites the whole file through a
/// temporary sibling and a rename, so readers of the file never observe a
/// half-written document and a batch written with `replace_entries` lands as one
/// unit.
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open (or create) a store at `path`.
    ///
    /// A missing file is treated as an empty store. A file that is not a JSON
    /// object of strings is discarded with a warning rather than failing
    /// startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<BTreeMap<String, String>>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Discarding unreadable store file");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        debug!(path = ?path, entries = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Open the store in the platform data directory under `app_name`.
    pub fn in_data_dir(app_name: &str) -> Result<Self> {
        Self::open(Self::default_path(app_name)?)
    }

    /// Default store location: `<data_dir>/<app_name>/session.json`.
    pub fn default_path(app_name: &str) -> Result<PathBuf> {
        let base = dirs::data_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No platform data directory".to_string())
        })?;
        Ok(base.join(app_name).join(STORE_FILE_NAME))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| BridgeError::OperationFailed("File store lock poisoned".to_string()))
    }

    /// Apply `mutate` to a copy of the entries, persist it, then publish it.
    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut guard = self.lock()?;
        let mut next = guard.clone();
        mutate(&mut next);

        if next == *guard {
            return Ok(());
        }

        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to encode store: {}", e))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn replace_entries(&self, pairs: &[(&str, &str)], removed: &[&str]) -> Result<()> {
        self.update(|entries| {
            for (key, value) in pairs {
                entries.insert(key.to_string(), value.to_string());
            }
            for key in removed {
                entries.remove(*key);
            }
        })
    }
}
