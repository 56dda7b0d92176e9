//! In-memory Key-Value Storage

use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Process-local key-value store.
///
/// Nothing survives a restart. Useful for tests and for hosts that choose
/// not to persist a session. A store switched to read-only rejects every
/// write, like browser storage in a private window.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            entries: Mutex::new(map),
            read_only: AtomicBool::new(false),
        }
    }

    /// Reject (or accept again) every write and delete.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| BridgeError::OperationFailed("Memory store lock poisoned".to_string()))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(
                "Memory store is read-only".to_string(),
            ));
        }
        self.lock()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock_for_write()?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock_for_write()?.remove(key);
        Ok(())
    }

    fn replace_entries(&self, pairs: &[(&str, &str)], removed: &[&str]) -> Result<()> {
        let mut entries = self.lock_for_write()?;
        for (key, value) in pairs {
            entries.insert(key.to_string(), value.to_string());
        }
        for key in removed {
            entries.remove(*key);
        }
        Ok(())
    }
}
