//! # Session Configuration
//!
//! Provides configuration management for the session core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`SessionConfig`] holding every bridge and setting the auth core needs.
//! It enforces fail-fast validation so a misconfigured host fails at startup
//! rather than on the first request.
//!
//! ## Bridges
//!
//! - `HttpClient` - outbound REST calls (desktop default: reqwest)
//! - `KeyValueStore` - token persistence (desktop default: JSON file in the
//!   platform data directory, or the OS keychain with `secure-store`)
//! - `RedirectLocation` - login callback fragment (desktop default: an empty
//!   `CallbackLocation` the host feeds)
//!
//! Without the `desktop-shims` feature every bridge must be injected.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SessionConfig;
//! use std::sync::Arc;
//!
//! let config = SessionConfig::builder()
//!     .from_env()?
//!     .api_base_url("https://aurafy.example/api")
//!     .http_client(Arc::new(MyHttpClient))
//!     .token_storage(Arc::new(MyStore))
//!     .redirect_location(Arc::new(MyLocation))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, KeyValueStore, RedirectLocation};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default backend base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
/// Default timeout for the identity probe, refresh, and retried requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Upper bound accepted for `request_timeout`.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Default storage key for the access token.
pub const DEFAULT_ACCESS_TOKEN_KEY: &str = "token";
/// Default storage key for the refresh token.
pub const DEFAULT_REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Default route of the login view.
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Environment variable overriding the API base URL.
pub const ENV_API_BASE_URL: &str = "AURAFY_API_BASE_URL";
/// Environment variable overriding the request timeout, in whole seconds.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "AURAFY_REQUEST_TIMEOUT_SECS";

const APP_NAME: &str = "aurafy";

/// Validated configuration for the session core.
///
/// Use [`SessionConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct SessionConfig {
    /// Backend base URL without a trailing slash
    pub api_base_url: String,

    /// Timeout applied to every network operation the core issues
    pub request_timeout: Duration,

    /// Storage key of the access token
    pub access_token_key: String,

    /// Storage key of the refresh token
    pub refresh_token_key: String,

    /// Route the gate redirects unauthenticated visitors to
    pub login_route: String,

    /// HTTP client for backend calls
    pub http_client: Arc<dyn HttpClient>,

    /// Durable storage for the token pair
    pub token_storage: Arc<dyn KeyValueStore>,

    /// Source of the login callback fragment
    pub redirect_location: Arc<dyn RedirectLocation>,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("access_token_key", &self.access_token_key)
            .field("refresh_token_key", &self.refresh_token_key)
            .field("login_route", &self.login_route)
            .field("http_client", &"HttpClient { ... }")
            .field("token_storage", &"KeyValueStore { ... }")
            .field("redirect_location", &"RedirectLocation { ... }")
            .finish()
    }
}

impl SessionConfig {
    /// Creates a new builder for constructing a `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Absolute URL of a backend endpoint.
    ///
    /// ```
    /// # use core_runtime::config::SessionConfig;
    /// # fn check(config: &SessionConfig) {
    /// // with api_base_url = "http://127.0.0.1:8000/api"
    /// assert_eq!(config.endpoint("/me"), "http://127.0.0.1:8000/api/me");
    /// # }
    /// ```
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The base URL parses and uses http or https
    /// - The request timeout is in (0, 120 s]
    /// - Both storage keys are non-empty and distinct
    /// - The login route is an absolute path
    pub fn validate(&self) -> Result<()> {
        validate_base_url(&self.api_base_url)?;

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(format!(
                "Request timeout exceeds maximum of {} seconds",
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }

        if self.access_token_key.is_empty() || self.refresh_token_key.is_empty() {
            return Err(Error::Config("Token storage keys cannot be empty".to_string()));
        }

        if self.access_token_key == self.refresh_token_key {
            return Err(Error::Config(
                "Access and refresh tokens must use different storage keys".to_string(),
            ));
        }

        if !self.login_route.starts_with('/') {
            return Err(Error::Config(format!(
                "Login route must be an absolute path, got '{}'",
                self.login_route
            )));
        }

        Ok(())
    }
}

fn validate_base_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "API base URL must use http or https, got '{}'",
            other
        ))),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "HttpClient implementation is required for backend calls. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Web: enable the 'wasm' feature and start through bootstrap_wasm.",
    ))
}

#[cfg(feature = "secure-store")]
fn provide_default_token_storage(_path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::KeyringKeyValueStore;

    let store: Arc<dyn KeyValueStore> = Arc::new(KeyringKeyValueStore::with_service_name(APP_NAME));
    Ok(store)
}

#[cfg(all(feature = "desktop-shims", not(feature = "secure-store")))]
fn provide_default_token_storage(path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    use bridge_desktop::FileKeyValueStore;

    let store = match path {
        Some(path) => FileKeyValueStore::open(path),
        None => FileKeyValueStore::in_data_dir(APP_NAME),
    }
    .map_err(|e| Error::Internal(format!("Failed to open default token storage: {}", e)))?;

    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_token_storage(_path: Option<PathBuf>) -> Result<Arc<dyn KeyValueStore>> {
    Err(capability_missing(
        "KeyValueStore",
        "KeyValueStore implementation is required for token persistence. \
         Desktop: enable the 'desktop-shims' feature to use the default file store. \
         Web: enable the 'wasm' feature and start through bootstrap_wasm.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_redirect_location() -> Result<Arc<dyn RedirectLocation>> {
    use bridge_desktop::CallbackLocation;

    let location: Arc<dyn RedirectLocation> = Arc::new(CallbackLocation::new());
    Ok(location)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_redirect_location() -> Result<Arc<dyn RedirectLocation>> {
    Err(capability_missing(
        "RedirectLocation",
        "RedirectLocation implementation is required to receive the login callback. \
         Desktop: enable the 'desktop-shims' feature to use CallbackLocation. \
         Web: enable the 'wasm' feature and start through bootstrap_wasm.",
    ))
}

/// Builder for constructing [`SessionConfig`] instances.
///
/// Every setting has a default; bridges fall back to desktop implementations
/// when the `desktop-shims` feature is enabled.
#[derive(Default)]
pub struct SessionConfigBuilder {
    api_base_url: Option<String>,
    request_timeout: Option<Duration>,
    access_token_key: Option<String>,
    refresh_token_key: Option<String>,
    login_route: Option<String>,
    token_storage_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    token_storage: Option<Arc<dyn KeyValueStore>>,
    redirect_location: Option<Arc<dyn RedirectLocation>>,
}

impl SessionConfigBuilder {
    /// Sets the backend base URL. A trailing slash is ignored.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the timeout applied to the identity probe, the refresh call, and
    /// retried requests.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the storage key of the access token.
    pub fn access_token_key(mut self, key: impl Into<String>) -> Self {
        self.access_token_key = Some(key.into());
        self
    }

    /// Sets the storage key of the refresh token.
    pub fn refresh_token_key(mut self, key: impl Into<String>) -> Self {
        self.refresh_token_key = Some(key.into());
        self
    }

    /// Sets the route of the login view.
    pub fn login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = Some(route.into());
        self
    }

    /// Sets where the default file store keeps its data. Ignored when a
    /// `token_storage` is injected.
    pub fn token_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_storage_path = Some(path.into());
        self
    }

    /// Sets the HTTP client.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the durable token storage.
    pub fn token_storage(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.token_storage = Some(store);
        self
    }

    /// Sets the redirect location.
    pub fn redirect_location(mut self, location: Arc<dyn RedirectLocation>) -> Self {
        self.redirect_location = Some(location);
        self
    }

    /// Applies `AURAFY_API_BASE_URL` and `AURAFY_REQUEST_TIMEOUT_SECS` from
    /// the process environment.
    pub fn from_env(self) -> Result<Self> {
        self.from_env_vars(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    pub fn from_env_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = Some(url.trim().to_string());
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_REQUEST_TIMEOUT_SECS, raw
                ))
            })?;
            self.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(self)
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for invalid settings and
    /// `Error::CapabilityMissing` for a missing bridge without a default.
    pub fn build(self) -> Result<SessionConfig> {
        let api_base_url = self
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let token_storage = match self.token_storage {
            Some(store) => store,
            None => provide_default_token_storage(self.token_storage_path)?,
        };

        let redirect_location = match self.redirect_location {
            Some(location) => location,
            None => provide_default_redirect_location()?,
        };

        let config = SessionConfig {
            api_base_url,
            request_timeout,
            access_token_key: self
                .access_token_key
                .unwrap_or_else(|| DEFAULT_ACCESS_TOKEN_KEY.to_string()),
            refresh_token_key: self
                .refresh_token_key
                .unwrap_or_else(|| DEFAULT_REFRESH_TOKEN_KEY.to_string()),
            login_route: self
                .login_route
                .unwrap_or_else(|| DEFAULT_LOGIN_ROUTE.to_string()),
            http_client,
            token_storage,
            redirect_location,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse, NoRedirect};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct NullHttpClient;

    #[async_trait]
    impl HttpClient for NullHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Ok(HttpResponse::new(204, ""))
        }
    }

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, String>>);

    impl KeyValueStore for MapStore {
        fn get(&self, key: &str) -> std::result::Result<Option<String>, BridgeError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> std::result::Result<(), BridgeError> {
            self.0
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> std::result::Result<(), BridgeError> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn with_bridges() -> SessionConfigBuilder {
        SessionConfig::builder()
            .http_client(Arc::new(NullHttpClient))
            .token_storage(Arc::new(MapStore::default()))
            .redirect_location(Arc::new(NoRedirect))
    }

    #[test]
    fn test_defaults() {
        let config = with_bridges().build().unwrap();

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(20));
        assert_eq!(config.access_token_key, "token");
        assert_eq!(config.refresh_token_key, "refreshToken");
        assert_eq!(config.login_route, "/login");
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = with_bridges()
            .api_base_url("https://aurafy.example/api/")
            .build()
            .unwrap();

        assert_eq!(config.api_base_url, "https://aurafy.example/api");
        assert_eq!(config.endpoint("/me"), "https://aurafy.example/api/me");
        assert_eq!(
            config.endpoint("refresh_token"),
            "https://aurafy.example/api/refresh_token"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let err = with_bridges().api_base_url("not a url").build().unwrap_err();
        assert!(err.to_string().contains("Invalid API base URL"));

        let err = with_bridges()
            .api_base_url("ftp://aurafy.example")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_rejects_out_of_range_timeout() {
        assert!(with_bridges()
            .request_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(with_bridges()
            .request_timeout(Duration::from_secs(121))
            .build()
            .is_err());
        assert!(with_bridges()
            .request_timeout(Duration::from_secs(120))
            .build()
            .is_ok());
    }

    #[test]
    fn test_rejects_shared_storage_key() {
        let err = with_bridges()
            .refresh_token_key("token")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("different storage keys"));
    }

    #[test]
    fn test_rejects_relative_login_route() {
        assert!(with_bridges().login_route("login").build().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "https://staging.aurafy.example/api"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
        ]
        .into_iter()
        .collect();

        let config = with_bridges()
            .from_env_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.api_base_url, "https://staging.aurafy.example/api");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_env_rejects_non_numeric_timeout() {
        let result = with_bridges().from_env_vars(|name| {
            (name == ENV_REQUEST_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_bridge_is_capability_error() {
        let result = SessionConfig::builder()
            .token_storage(Arc::new(MapStore::default()))
            .redirect_location(Arc::new(NoRedirect))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("expected CapabilityMissing, got {:?}", other),
        }
    }

    #[cfg(all(feature = "desktop-shims", not(feature = "secure-store")))]
    #[test]
    fn test_build_with_desktop_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let config = SessionConfig::builder()
            .token_storage_path(path.clone())
            .build()
            .unwrap();

        config.token_storage.set("token", "abc").unwrap();
        assert!(path.exists());
        assert_eq!(config.redirect_location.take_fragment(), None);
    }
}
