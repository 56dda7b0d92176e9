//! Convenience helpers for wiring the wasm bridge implementations together.
//!
//! [`build_wasm_bridges`] constructs every browser adapter the session core
//! needs. It plays the role for web builds that the desktop defaults in
//! `core-runtime` play for native ones.

use std::sync::Arc;

use bridge_traits::{
    error::Result as BridgeResult, http::HttpClient, location::RedirectLocation,
    storage::KeyValueStore,
};

use crate::{http::WasmHttpClient, location::BrowserLocation, storage::LocalKeyValueStore};

/// Configuration for [`build_wasm_bridges`].
#[derive(Debug, Clone, Default)]
pub struct WasmBridgeConfig {
    /// Prefix for `localStorage` keys. Empty keeps the plain `token` and
    /// `refreshToken` keys.
    pub namespace: String,
}

impl WasmBridgeConfig {
    /// Create a config whose storage keys are prefixed with `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

/// Browser bridge objects ready for injection into the core.
pub struct WasmBridgeSet {
    /// HTTP client powered by browser `fetch`.
    pub http_client: Arc<dyn HttpClient>,
    /// Token storage layered on `localStorage`.
    pub token_storage: Arc<dyn KeyValueStore>,
    /// The window location carrying the login callback fragment.
    pub redirect_location: Arc<dyn RedirectLocation>,
}

/// Build the browser bridge stack.
///
/// Fails with [`NotAvailable`](bridge_traits::BridgeError::NotAvailable)
/// outside a window context (e.g. in a worker) or when storage is disabled.
pub fn build_wasm_bridges(config: WasmBridgeConfig) -> BridgeResult<WasmBridgeSet> {
    let http_client: Arc<dyn HttpClient> = Arc::new(WasmHttpClient::new()?);
    let token_storage: Arc<dyn KeyValueStore> =
        Arc::new(LocalKeyValueStore::with_namespace(&config.namespace)?);
    let redirect_location: Arc<dyn RedirectLocation> = Arc::new(BrowserLocation::new()?);

    Ok(WasmBridgeSet {
        http_client,
        token_storage,
        redirect_location,
    })
}
