//! `localStorage` implementation of the `KeyValueStore` bridge trait.
//!
//! Keys are stored as given, so a web client shares the `token` and
//! `refreshToken` entries with any other script on the same origin. A
//! namespace can be set to keep several hosts on one origin apart.

use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    storage::KeyValueStore,
};
use tracing::warn;
use web_sys::Storage;

use crate::error::{js_error, window};

fn local_storage() -> BridgeResult<Storage> {
    window()?
        .local_storage()
        .map_err(|err| js_error("localStorage", err))?
        .ok_or_else(|| BridgeError::NotAvailable("localStorage".into()))
}

/// Key-value store over `window.localStorage`.
#[derive(Clone)]
pub struct LocalKeyValueStore {
    storage: Storage,
    prefix: String,
}

impl LocalKeyValueStore {
    /// Store backed by the origin's `localStorage`, keys unprefixed.
    pub fn new() -> BridgeResult<Self> {
        Ok(Self {
            storage: local_storage()?,
            prefix: String::new(),
        })
    }

    /// Store whose keys are prefixed with `{namespace}::`.
    pub fn with_namespace(namespace: &str) -> BridgeResult<Self> {
        let mut store = Self::new()?;
        if !namespace.is_empty() {
            store.prefix = format!("{namespace}::");
        }
        Ok(store)
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl KeyValueStore for LocalKeyValueStore {
    fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        self.storage
            .get_item(&self.scoped(key))
            .map_err(|err| js_error("localStorage.getItem", err))
    }

    fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.storage
            .set_item(&self.scoped(key), value)
            .map_err(|err| js_error("localStorage.setItem", err))
    }

    fn remove(&self, key: &str) -> BridgeResult<()> {
        self.storage
            .remove_item(&self.scoped(key))
            .map_err(|err| js_error("localStorage.removeItem", err))
    }

    /// `setItem` can throw on a full quota. Earlier writes are rolled back
    /// before the error is returned and no key is removed.
    fn replace_entries(&self, entries: &[(&str, &str)], removed: &[&str]) -> BridgeResult<()> {
        let mut previous = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let before = self.get(key)?;
            if let Err(error) = self.set(key, value) {
                self.restore(&previous);
                return Err(error);
            }
            previous.push((*key, before));
        }

        for key in removed {
            self.remove(key)?;
        }
        Ok(())
    }
}

impl LocalKeyValueStore {
    fn restore(&self, previous: &[(&str, Option<String>)]) {
        for (key, before) in previous.iter().rev() {
            let restored = match before {
                Some(value) => self.set(key, value),
                None => self.remove(key),
            };
            if let Err(error) = restored {
                warn!(key, error = %error, "Could not roll back localStorage entry");
            }
        }
    }
}
