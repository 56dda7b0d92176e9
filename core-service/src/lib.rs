//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`SessionConfig`] into the session core and
//! the feature client. Desktop apps typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) and start through
//! [`bootstrap_desktop`]. Browser builds enable the `wasm` feature instead
//! and start through `bootstrap_wasm`, which uses the adapters from
//! `bridge-wasm`. Other hosts supply their own bridges and call
//! [`CoreService::new`].

pub mod error;

pub use error::{CoreError, Result};

use core_auth::{AuthManager, GateDecision, Session, UserProfile};
use core_insights::InsightsClient;
use core_runtime::config::SessionConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::info;

#[cfg(feature = "desktop-shims")]
use bridge_desktop::CallbackLocation;
#[cfg(any(feature = "desktop-shims", all(feature = "wasm", target_arch = "wasm32")))]
use core_runtime::config::SessionConfigBuilder;
#[cfg(feature = "desktop-shims")]
use std::sync::Arc;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use bridge_wasm::WasmBridgeConfig;
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
use bridge_wasm::build_wasm_bridges;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: SessionConfig,
    auth: AuthManager,
    insights: InsightsClient,
}

impl CoreService {
    /// Create a service with its own event bus.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_event_bus(config, EventBus::default())
    }

    /// Create a service publishing to `events`.
    pub fn with_event_bus(config: SessionConfig, events: EventBus) -> Result<Self> {
        config.validate()?;

        let auth = AuthManager::new(&config, events);
        let insights = InsightsClient::new(auth.client().clone());

        Ok(Self {
            config,
            auth,
            insights,
        })
    }

    /// Restore the session. Call once before serving protected views.
    ///
    /// Returns the signed-in profile, or `None` when the visitor has to log
    /// in. Failures that leave the session unauthenticated are reported
    /// through the session state and events, not as errors.
    pub async fn initialize(&self) -> Result<Option<UserProfile>> {
        match self.auth.initialize().await {
            Ok(profile) => Ok(Some(profile)),
            Err(e @ core_auth::AuthError::Storage(_)) => Err(e.into()),
            Err(e) => {
                info!(reason = %e, "Session not restored");
                Ok(None)
            }
        }
    }

    pub fn logout(&self) -> Result<()> {
        Ok(self.auth.logout()?)
    }

    /// Gate decision for `requested`, waiting for bootstrap if it is running.
    pub async fn route(&self, requested: &str) -> GateDecision {
        self.auth.gate().resolve(self.auth.session(), requested).await
    }

    pub fn session(&self) -> &Session {
        self.auth.session()
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn insights(&self) -> &InsightsClient {
        &self.insights
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to session lifecycle events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.auth.events().subscribe())
    }

    /// URL the login view navigates to.
    pub fn login_url(&self) -> String {
        self.auth.login_url()
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Applies environment overrides, fills missing bridges with the desktop
/// defaults, feeds `callback_url` (the login redirect the app was launched
/// with, if any) to the session core and runs the bootstrap pass.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::SessionConfig;
/// use core_service::bootstrap_desktop;
///
/// let launch_url = std::env::args().nth(1);
/// let core = bootstrap_desktop(SessionConfig::builder(), launch_url.as_deref()).await?;
///
/// if !core.session().is_authenticated() {
///     println!("Log in at {}", core.login_url());
/// }
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    builder: SessionConfigBuilder,
    callback_url: Option<&str>,
) -> Result<CoreService> {
    let location = Arc::new(CallbackLocation::new());
    if let Some(url) = callback_url {
        if !location.capture_url(url) {
            tracing::warn!("Launch URL carried no login callback");
        }
    }

    let config = builder.from_env()?.redirect_location(location).build()?;
    let core = CoreService::new(config)?;
    core.initialize().await?;

    info!(
        status = %core.session().status(),
        "Desktop core ready"
    );
    Ok(core)
}

/// Convenience bootstrapper for browser hosts.
///
/// Injects the `fetch`, `localStorage` and `window.location` bridges, takes
/// any login callback from the address bar and runs the bootstrap pass.
///
/// ```ignore
/// use core_runtime::config::SessionConfig;
/// use core_service::{bootstrap_wasm, WasmBridgeConfig};
///
/// let builder = SessionConfig::builder().api_base_url("https://app.example/api");
/// let core = bootstrap_wasm(builder, WasmBridgeConfig::default()).await?;
/// ```
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub async fn bootstrap_wasm(
    builder: SessionConfigBuilder,
    bridge_config: WasmBridgeConfig,
) -> Result<CoreService> {
    let bridges =
        build_wasm_bridges(bridge_config).map_err(|err| core_runtime::Error::CapabilityMissing {
            capability: "browser bridges".to_string(),
            message: err.to_string(),
        })?;

    let config = builder
        .http_client(bridges.http_client)
        .token_storage(bridges.token_storage)
        .redirect_location(bridges.redirect_location)
        .build()?;
    let core = CoreService::new(config)?;
    core.initialize().await?;

    info!(status = %core.session().status(), "Browser core ready");
    Ok(core)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{HttpClient, HttpRequest, HttpResponse, NoRedirect};
    use core_auth::SessionStatus;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct Backend;

    #[async_trait]
    impl HttpClient for Backend {
        async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            if request.query_value("access_token") != Some("T") {
                return Ok(HttpResponse::new(401, ""));
            }
            if request.url.ends_with("/me") {
                return Ok(HttpResponse::new(200, r#"{"id":"u1"}"#));
            }
            Ok(HttpResponse::new(200, r#"{"items":[{"id":"p1","name":"Focus"}],"total":1}"#))
        }
    }

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, String>>);

    impl bridge_traits::KeyValueStore for MapStore {
        fn get(&self, key: &str) -> bridge_traits::error::Result<Option<String>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &str) -> bridge_traits::error::Result<()> {
            self.0
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove(&self, key: &str) -> bridge_traits::error::Result<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn service(stored: Option<&str>) -> CoreService {
        let store = MapStore::default();
        if let Some(token) = stored {
            store.0.lock().unwrap().insert("token".to_string(), token.to_string());
        }
        let config = SessionConfig::builder()
            .api_base_url("http://backend.test/api")
            .http_client(Arc::new(Backend))
            .token_storage(Arc::new(store))
            .redirect_location(Arc::new(NoRedirect))
            .build()
            .unwrap();
        CoreService::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_signed_in_flow() {
        let core = service(Some("T"));

        let profile = core.initialize().await.unwrap();
        assert_eq!(profile.unwrap().id, "u1");
        assert_eq!(core.route("/dashboard").await, GateDecision::Render);

        let page = core.insights().playlists().await.unwrap();
        assert_eq!(page.items[0].name, "Focus");

        core.logout().unwrap();
        assert_eq!(core.session().status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_visitor_without_token_is_routed_to_login() {
        let core = service(None);

        assert_eq!(core.initialize().await.unwrap(), None);
        assert_eq!(
            core.route("/dashboard").await,
            GateDecision::Redirect {
                to: "/login?next=%2Fdashboard".to_string()
            }
        );
    }
}
