//! Credential Storage using the OS Keychain

use bridge_traits::{
    error::{BridgeError, Result},
    storage::KeyValueStore,
};
use keyring::Entry;
use tracing::debug;

/// Keyring-backed key-value storage
///
/// Uses platform-specific secure storage:
/// - macOS: Keychain
/// - Windows: Credential Manager (DPAPI)
/// - Linux: Secret Service (libsecret)
///
/// Each key becomes one credential entry under `service_name`. Values are
/// stored as-is; the keychain only holds strings, which matches the
/// `KeyValueStore` contract.
pub struct KeyringKeyValueStore {
    service_name: String,
}

impl KeyringKeyValueStore {
    /// Create a store with the default service name
    pub fn new() -> Self {
        Self::with_service_name("aurafy")
    }

    /// Create a store with a custom service name
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service_name, key).map_err(Self::map_keyring_error)
    }

    fn map_keyring_error(e: keyring::Error) -> BridgeError {
        match e {
            keyring::Error::NoStorageAccess(inner) => {
                BridgeError::NotAvailable(format!("Keyring unavailable: {}", inner))
            }
            keyring::Error::PlatformFailure(inner) => {
                BridgeError::NotAvailable(format!("Keyring platform failure: {}", inner))
            }
            other => BridgeError::OperationFailed(format!("Keyring error: {}", other)),
        }
    }
}

impl Default for KeyringKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(Self::map_keyring_error)?;
        debug!(key = key, "Stored value in keyring");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                debug!(key = key, "Removed value from keyring");
                Ok(())
            }
            Err(e) => Err(Self::map_keyring_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keyring tests need a live OS credential service, so they are ignored by
    // default. Run with `cargo test -- --ignored` on a desktop session.

    #[test]
    #[ignore]
    fn test_set_get_remove() {
        let store = KeyringKeyValueStore::with_service_name("aurafy-test");

        store.set("token", "access-123").unwrap();
        assert_eq!(store.get("token").unwrap(), Some("access-123".to_string()));

        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
    }

    #[test]
    #[ignore]
    fn test_remove_missing_entry_succeeds() {
        let store = KeyringKeyValueStore::with_service_name("aurafy-test");
        store.remove("never-written").unwrap();
    }

    #[test]
    fn test_default_service_name() {
        let store = KeyringKeyValueStore::default();
        assert_eq!(store.service_name, "aurafy");
    }
}
