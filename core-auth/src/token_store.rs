//! Durable Token Storage
//!
//! Persists the access/refresh token pair through the host's
//! [`KeyValueStore`] under two fixed keys, so a reload can rehydrate the
//! session.
//!
//! ## Guarantees
//!
//! - Values are opaque strings; nothing here inspects or validates them
//! - Writing the pair goes through `replace_entries`, which the desktop
//!   stores apply as one unit
//! - Token values are never logged
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::TokenStore;
//! use std::sync::Arc;
//! # use bridge_traits::storage::KeyValueStore;
//! # fn example(store: Arc<dyn KeyValueStore>) -> core_auth::Result<()> {
//! let tokens = TokenStore::new(store, "token", "refreshToken");
//!
//! tokens.save_pair("access", Some("refresh"))?;
//! assert_eq!(tokens.load()?.access_token.as_deref(), Some("access"));
//!
//! tokens.clear_all()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::PersistedTokens;
use bridge_traits::storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Token persistence over a host key-value store.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    access_key: String,
    refresh_key: String,
}

impl TokenStore {
    /// Create a token store writing the access token under `access_key` and
    /// the refresh token under `refresh_key`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        access_key: impl Into<String>,
        refresh_key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            access_key: access_key.into(),
            refresh_key: refresh_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn refresh_key(&self) -> &str {
        &self.refresh_key
    }

    /// Read a raw value. Returns `Ok(None)` when the key is absent.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key).map_err(|e| {
            warn!(key = key, error = %e, "Failed to read from token storage");
            AuthError::Storage(e.to_string())
        })
    }

    /// Write a raw value.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.set(key, value).map_err(|e| {
            warn!(key = key, error = %e, "Failed to write token storage");
            AuthError::Storage(e.to_string())
        })
    }

    /// Remove a raw value. Removing an absent key succeeds.
    pub fn clear(&self, key: &str) -> Result<()> {
        self.store.remove(key).map_err(|e| {
            warn!(key = key, error = %e, "Failed to clear token storage");
            AuthError::Storage(e.to_string())
        })
    }

    /// Read both tokens.
    pub fn load(&self) -> Result<PersistedTokens> {
        let tokens = PersistedTokens {
            access_token: self.get(&self.access_key)?,
            refresh_token: self.get(&self.refresh_key)?,
        };

        debug!(
            has_access_token = tokens.access_token.is_some(),
            has_refresh_token = tokens.refresh_token.is_some(),
            "Loaded persisted tokens"
        );

        Ok(tokens)
    }

    /// Persist a freshly delivered pair.
    ///
    /// Without a refresh token any previously stored one is removed, since it
    /// belongs to an earlier grant.
    pub fn save_pair(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let result = match refresh_token {
            Some(refresh_token) => self.store.replace_entries(
                &[
                    (self.access_key.as_str(), access_token),
                    (self.refresh_key.as_str(), refresh_token),
                ],
                &[],
            ),
            None => self.store.replace_entries(
                &[(self.access_key.as_str(), access_token)],
                &[self.refresh_key.as_str()],
            ),
        };
        result.map_err(|e| {
            warn!(error = %e, "Failed to persist token pair");
            AuthError::Storage(e.to_string())
        })?;

        info!(
            has_refresh_token = refresh_token.is_some(),
            "Token pair stored"
        );
        Ok(())
    }

    /// Replace the access token, keeping the refresh token.
    pub fn save_access_token(&self, access_token: &str) -> Result<()> {
        self.set(&self.access_key, access_token)?;
        debug!("Access token replaced");
        Ok(())
    }

    /// Remove both tokens.
    pub fn clear_all(&self) -> Result<()> {
        self.store
            .remove_entries(&[self.access_key.as_str(), self.refresh_key.as_str()])
            .map_err(|e| {
                warn!(error = %e, "Failed to clear persisted tokens");
                AuthError::Storage(e.to_string())
            })?;

        info!("Persisted tokens cleared");
        Ok(())
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("access_key", &self.access_key)
            .field("refresh_key", &self.refresh_key)
            .finish()
    }
}
