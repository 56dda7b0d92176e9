//! # Authentication Manager
//!
//! Owns every session component and wires them together from one
//! [`SessionConfig`].
//!
//! ## Overview
//!
//! The `AuthManager` is created once by the composition root. It exposes:
//!
//! - [`AuthManager::initialize`] to run the bootstrap pass before any
//!   protected route is served
//! - [`AuthManager::logout`] to end the session synchronously
//! - the shared [`Session`] handle, the [`AuthorizedClient`] for feature calls
//!   and the [`RouteGate`]
//!
//! ## Usage
//!
//! ```no_run
//! use bridge_desktop::{CallbackLocation, MemoryKeyValueStore, ReqwestHttpClient};
//! use core_auth::{AuthManager, GateDecision};
//! use core_runtime::config::SessionConfig;
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::builder()
//!     .api_base_url("http://127.0.0.1:8000/api")
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .token_storage(Arc::new(MemoryKeyValueStore::new()))
//!     .redirect_location(Arc::new(CallbackLocation::new()))
//!     .build()?;
//!
//! let manager = AuthManager::new(&config, EventBus::default());
//! let _ = manager.initialize().await;
//!
//! match manager.gate().decide(&manager.session().snapshot(), "/dashboard") {
//!     GateDecision::Render => println!("welcome back"),
//!     GateDecision::Redirect { to } => println!("go to {}", to),
//!     GateDecision::Placeholder => println!("loading"),
//! }
//!
//! manager.logout()?;
//! # Ok(())
//! # }
//! ```

use crate::api::AuthApi;
use crate::client::AuthorizedClient;
use crate::error::Result;
use crate::gate::RouteGate;
use crate::initializer::AuthInitializer;
use crate::refresh::RefreshCoordinator;
use crate::session::Session;
use crate::token_store::TokenStore;
use crate::types::UserProfile;
use core_runtime::config::SessionConfig;
use core_runtime::events::{EventBus, SessionEvent};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Composition of the session components.
#[derive(Clone)]
pub struct AuthManager {
    session: Session,
    tokens: TokenStore,
    api: AuthApi,
    refresh: RefreshCoordinator,
    client: AuthorizedClient,
    initializer: AuthInitializer,
    gate: RouteGate,
    events: EventBus,
}

impl AuthManager {
    /// Build every component from `config`.
    ///
    /// Nothing touches the network or storage until [`initialize`](Self::initialize).
    pub fn new(config: &SessionConfig, events: EventBus) -> Self {
        let session = Session::new();
        let tokens = TokenStore::new(
            Arc::clone(&config.token_storage),
            config.access_token_key.clone(),
            config.refresh_token_key.clone(),
        );
        let api = AuthApi::from_config(config);
        let refresh =
            RefreshCoordinator::new(api.clone(), tokens.clone(), session.clone(), events.clone());
        let client = AuthorizedClient::new(
            Arc::clone(&config.http_client),
            session.clone(),
            refresh.clone(),
            config.api_base_url.clone(),
            config.request_timeout,
        );
        let initializer = AuthInitializer::new(
            api.clone(),
            tokens.clone(),
            session.clone(),
            refresh.clone(),
            Arc::clone(&config.redirect_location),
            events.clone(),
        );
        let gate = RouteGate::new(config.login_route.clone());

        Self {
            session,
            tokens,
            api,
            refresh,
            client,
            initializer,
            gate,
            events,
        }
    }

    /// Run the bootstrap pass.
    ///
    /// Hosts call this once at start. The outcome is also published to the
    /// session; UI code should read [`Session::status`] rather than branch on
    /// the returned error.
    pub async fn initialize(&self) -> Result<UserProfile> {
        self.initializer.run().await
    }

    /// End the session.
    ///
    /// Clears both stored tokens and the in-memory state, and detaches any
    /// in-flight refresh so its result is discarded. The in-memory state is
    /// always reset, even when clearing storage fails.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<()> {
        let mut cleared = Ok(());
        self.session
            .reset_with(|| cleared = self.tokens.clear_all());
        self.refresh.invalidate();

        let _ = self.events.emit(SessionEvent::SignedOut);

        match &cleared {
            Ok(()) => info!("Signed out"),
            Err(e) => warn!(error = %e, "Signed out but stored tokens could not be cleared"),
        }
        cleared
    }

    /// Obtain a new access token through the single-flight coordinator.
    pub async fn refresh(&self) -> Result<String> {
        self.refresh.refresh().await
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &AuthorizedClient {
        &self.client
    }

    pub fn gate(&self) -> &RouteGate {
        &self.gate
    }

    pub fn api(&self) -> &AuthApi {
        &self.api
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// URL the login view navigates to.
    pub fn login_url(&self) -> String {
        self.api.login_url()
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("session", &self.session)
            .field("gate", &self.gate)
            .field("refresh", &self.refresh)
            .finish()
    }
}
