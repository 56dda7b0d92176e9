//! Durable Key-Value Storage
//!
//! Provides a platform-agnostic trait for small, durable string values that
//! must survive a restart of the host (browser `localStorage`, a settings
//! file, the OS keychain).

use crate::error::Result;
use crate::platform::PlatformSendSync;

/// Durable key-value storage trait
///
/// Abstracts platform-specific persistence:
/// - Web: `localStorage` (origin scoped)
/// - Desktop: JSON file in the application data directory, or the OS keychain
/// - Tests: in-memory map
///
/// All operations are synchronous and perform no network I/O. Values are
/// opaque strings; implementations must not interpret them.
///
/// # Atomicity
///
/// Each single-key operation is atomic. [`replace_entries`](KeyValueStore::replace_entries)
/// writes and deletes several keys as one unit where the backend allows it.
/// The default implementation falls back to one call per key, applying every
/// write before any delete, so a failed write never leaves the deletes
/// applied.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyValueStore;
///
/// fn remember(store: &dyn KeyValueStore, token: &str) -> Result<()> {
///     store.set("token", token)?;
///     Ok(())
/// }
/// ```
pub trait KeyValueStore: PlatformSendSync {
    /// Retrieve a value. Returns `Ok(None)` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;

    /// Store `entries` and delete `removed` as one unit.
    fn replace_entries(&self, entries: &[(&str, &str)], removed: &[&str]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        for key in removed {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Store several values as one unit.
    fn set_entries(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.replace_entries(entries, &[])
    }

    /// Delete several values as one unit.
    fn remove_entries(&self, keys: &[&str]) -> Result<()> {
        self.replace_entries(&[], keys)
    }

    /// Check if a key exists without retrieving it.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
