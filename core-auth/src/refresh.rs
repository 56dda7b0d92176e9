//! # Single-flight Token Refresh
//!
//! Concurrent callers of [`RefreshCoordinator::refresh`] share one network
//! call. The in-flight call is stored as a [`Shared`] future in a slot; late
//! callers clone it instead of starting another request. The future clears
//! its own slot when it settles, so the next call after settlement starts a
//! fresh attempt.
//!
//! ## Outcomes
//!
//! - Success: the new access token is persisted and published to the session.
//!   If storage refuses the write, the token is still published and lives
//!   in memory until the next restart
//! - 4xx from the refresh endpoint, or no refresh token: fatal. Both tokens
//!   are cleared and the session becomes unauthenticated
//! - Network failure, timeout or 5xx: transient. Stored tokens are kept
//!
//! Every outcome is applied only if the session generation captured when the
//! flight started is still current. After a logout the result is dropped and
//! callers receive [`AuthError::Superseded`].

use crate::api::AuthApi;
use crate::error::{AuthError, Result};
use crate::session::Session;
use crate::token_store::TokenStore;
use core_runtime::events::{EventBus, SessionEvent};
use futures::future::{FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, instrument, warn};

// Browser HTTP futures are not `Send`.
#[cfg(not(target_arch = "wasm32"))]
type RefreshFuture = Shared<futures::future::BoxFuture<'static, Result<String>>>;
#[cfg(target_arch = "wasm32")]
type RefreshFuture = Shared<futures::future::LocalBoxFuture<'static, Result<String>>>;

struct InFlight {
    id: u64,
    generation: u64,
    future: RefreshFuture,
}

struct Inner {
    api: AuthApi,
    tokens: TokenStore,
    session: Session,
    events: EventBus,
    slot: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

/// Collapses concurrent refresh requests into one network call.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(api: AuthApi, tokens: TokenStore, session: Session, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                tokens,
                session,
                events,
                slot: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Obtain a new access token, joining the in-flight refresh if there is one.
    ///
    /// Every caller joined to the same flight observes the same result.
    pub async fn refresh(&self) -> Result<String> {
        self.join_or_start(None).await
    }

    /// Replace `rejected`, an access token the backend refused.
    ///
    /// When the session already moved past `rejected`, the current token is
    /// returned without a network call. This keeps late 401s from a burst of
    /// requests from starting a second refresh after the first one settled.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String> {
        self.join_or_start(Some(rejected)).await
    }

    async fn join_or_start(&self, rejected: Option<&str>) -> Result<String> {
        let future = {
            let mut slot = self.inner.lock_slot();
            let generation = self.inner.session.generation();

            match slot.as_ref() {
                Some(in_flight) if in_flight.generation == generation => {
                    debug!(flight = in_flight.id, "Joining in-flight token refresh");
                    in_flight.future.clone()
                }
                _ => {
                    // A settled flight publishes its token before leaving the slot.
                    if let Some(rejected) = rejected {
                        match self.inner.session.access_token() {
                            Some(current) if current != rejected => return Ok(current),
                            Some(_) => {}
                            None => return Err(AuthError::AuthMissing),
                        }
                    }

                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let future = Inner::start(Arc::downgrade(&self.inner), id, generation);
                    *slot = Some(InFlight {
                        id,
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }

    /// Forget the in-flight refresh, if any.
    ///
    /// Callers already waiting still receive its result, but the next call
    /// starts a new flight.
    pub fn invalidate(&self) {
        if let Some(in_flight) = self.inner.lock_slot().take() {
            debug!(flight = in_flight.id, "Invalidated in-flight token refresh");
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.inner.lock_slot().is_some()
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<InFlight>> {
        // The slot holds no invariant a panic could break.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn start(inner: Weak<Inner>, id: u64, generation: u64) -> RefreshFuture {
        let flight = async move {
            let Some(this) = inner.upgrade() else {
                return Err(AuthError::Superseded);
            };

            let outcome = this.run(generation).await;

            let mut slot = this.lock_slot();
            if slot.as_ref().is_some_and(|in_flight| in_flight.id == id) {
                *slot = None;
            }
            outcome
        };

        #[cfg(not(target_arch = "wasm32"))]
        let flight = flight.boxed();
        #[cfg(target_arch = "wasm32")]
        let flight = flight.boxed_local();
        flight.shared()
    }

    #[instrument(skip(self))]
    async fn run(&self, generation: u64) -> Result<String> {
        let refresh_token = match self.session.refresh_token() {
            Some(token) => Some(token),
            None => self.tokens.load()?.refresh_token,
        };

        let Some(refresh_token) = refresh_token else {
            warn!("Refresh requested without a refresh token");
            self.end_session(generation, "no refresh token available");
            return Err(AuthError::NoRefreshToken);
        };

        let _ = self.events.emit(SessionEvent::TokenRefreshing);

        match self.api.refresh_access_token(&refresh_token).await {
            Ok(grant) => {
                let applied = self.session.persist_and_update(
                    generation,
                    || match grant.refresh_token.as_deref() {
                        Some(rotated) => self.tokens.save_pair(&grant.access_token, Some(rotated)),
                        None => self.tokens.save_access_token(&grant.access_token),
                    },
                    |state| {
                        state.access_token = Some(grant.access_token.clone());
                        if let Some(rotated) = &grant.refresh_token {
                            state.refresh_token = Some(rotated.clone());
                        }
                    },
                );

                let Some((stored, ())) = applied else {
                    info!("Discarding refreshed token: session changed during refresh");
                    return Err(AuthError::Superseded);
                };
                if let Err(e) = stored {
                    warn!(error = %e, "Refreshed token kept in memory only");
                }

                info!("Access token refreshed");
                let _ = self.events.emit(SessionEvent::TokenRefreshed);
                Ok(grant.access_token)
            }
            Err(error) if error.is_transient() => {
                warn!(error = %error, "Token refresh failed transiently, keeping credentials");
                if self.session.generation() == generation {
                    let _ = self.events.emit(SessionEvent::AuthError {
                        message: error.to_string(),
                        recoverable: true,
                    });
                }
                Err(AuthError::RefreshTransient(error))
            }
            Err(error) => {
                warn!(error = %error, "Refresh token rejected");
                self.end_session(generation, &error.to_string());
                Err(AuthError::RefreshRejected(error))
            }
        }
    }

    /// Clear credentials after a fatal refresh outcome.
    ///
    /// Unlike logout this keeps the generation, so a bootstrap pass waiting on
    /// this refresh can still finish.
    fn end_session(&self, generation: u64, reason: &str) {
        let applied = self.session.persist_and_update(
            generation,
            || self.tokens.clear_all(),
            |state| state.clear_credentials(),
        );

        let Some((cleared, ())) = applied else {
            return;
        };
        if let Err(e) = cleared {
            warn!(error = %e, "Failed to clear tokens after refresh rejection");
        }

        let _ = self.events.emit(SessionEvent::AuthError {
            message: reason.to_string(),
            recoverable: false,
        });
        let _ = self.events.emit(SessionEvent::SignedOut);
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionStatus;
    use async_trait::async_trait;
    use bridge_desktop::MemoryKeyValueStore;
    use bridge_traits::{BridgeError, HttpClient, HttpRequest, HttpResponse};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Refresh endpoint that answers with `status` after `gate` is opened.
    struct GatedRefresh {
        calls: AtomicUsize,
        gate: Notify,
        status: u16,
    }

    #[async_trait]
    impl HttpClient for GatedRefresh {
        async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.gate.notified().await;
            match self.status {
                200 => {
                    let body = format!(r#"{{"access_token":"fresh-{}"}}"#, call);
                    Ok(HttpResponse::new(200, body))
                }
                0 => Err(BridgeError::Connection(format!("{} unreachable", request.url))),
                status => Ok(HttpResponse::new(status, "")),
            }
        }
    }

    struct Fixture {
        http: Arc<GatedRefresh>,
        store: Arc<MemoryKeyValueStore>,
        tokens: TokenStore,
        session: Session,
        coordinator: RefreshCoordinator,
        generation: u64,
    }

    fn fixture(status: u16) -> Fixture {
        let http = Arc::new(GatedRefresh {
            calls: AtomicUsize::new(0),
            gate: Notify::new(),
            status,
        });
        let store = Arc::new(MemoryKeyValueStore::with_entries([
            ("token", "stale"),
            ("refreshToken", "R"),
        ]));
        let tokens = TokenStore::new(store.clone(), "token", "refreshToken");
        let session = Session::new();
        let generation = session.begin_bootstrap();
        session.update_if_current(generation, |state| {
            state.access_token = Some("stale".to_string());
            state.refresh_token = Some("R".to_string());
            state.loading = false;
        });

        let api = AuthApi::new(http.clone(), "http://backend.test/api", Duration::from_secs(5));
        let coordinator =
            RefreshCoordinator::new(api, tokens.clone(), session.clone(), EventBus::default());

        Fixture {
            http,
            store,
            tokens,
            session,
            coordinator,
            generation,
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_call() {
        let f = fixture(200);

        let first = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.refresh().await }
        });
        let second = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.refresh().await }
        });

        while f.http.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        f.http.gate.notify_one();

        assert_eq!(first.await.unwrap().unwrap(), "fresh-1");
        assert_eq!(second.await.unwrap().unwrap(), "fresh-1");
        assert_eq!(f.http.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.session.access_token().as_deref(), Some("fresh-1"));
        assert_eq!(f.tokens.load().unwrap().access_token.as_deref(), Some("fresh-1"));
        assert!(!f.coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_settled_flight_allows_new_attempt() {
        let f = fixture(200);

        f.http.gate.notify_one();
        assert_eq!(f.coordinator.refresh().await.unwrap(), "fresh-1");

        f.http.gate.notify_one();
        assert_eq!(f.coordinator.refresh().await.unwrap(), "fresh-2");
        assert_eq!(f.http.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejection_clears_credentials() {
        let f = fixture(400);

        f.http.gate.notify_one();
        let error = f.coordinator.refresh().await.unwrap_err();

        assert!(matches!(error, AuthError::RefreshRejected(_)));
        assert!(error.is_fatal());
        assert!(f.tokens.load().unwrap().is_empty());
        assert_eq!(f.session.status(), SessionStatus::Unauthenticated);
        assert_eq!(f.session.generation(), f.generation);
    }

    #[tokio::test]
    async fn test_unwritable_storage_keeps_token_in_memory() {
        let f = fixture(200);
        f.store.set_read_only(true);

        f.http.gate.notify_one();
        assert_eq!(f.coordinator.refresh().await.unwrap(), "fresh-1");

        let snapshot = f.session.snapshot();
        assert_eq!(snapshot.access_token.as_deref(), Some("fresh-1"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("R"));
        assert!(!snapshot.loading);
        assert_eq!(f.tokens.load().unwrap().access_token.as_deref(), Some("stale"));
        assert!(!f.coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_credentials() {
        for status in [0, 503] {
            let f = fixture(status);

            f.http.gate.notify_one();
            let error = f.coordinator.refresh().await.unwrap_err();

            assert!(matches!(error, AuthError::RefreshTransient(_)));
            let stored = f.tokens.load().unwrap();
            assert_eq!(stored.access_token.as_deref(), Some("stale"));
            assert_eq!(stored.refresh_token.as_deref(), Some("R"));
        }
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_fatal_without_network() {
        let f = fixture(200);
        f.tokens.clear("refreshToken").unwrap();
        f.session.update_if_current(f.generation, |state| state.refresh_token = None);

        let error = f.coordinator.refresh().await.unwrap_err();

        assert!(matches!(error, AuthError::NoRefreshToken));
        assert_eq!(f.http.calls.load(Ordering::SeqCst), 0);
        assert!(f.tokens.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_result_after_reset_is_discarded() {
        let f = fixture(200);

        let pending = tokio::spawn({
            let coordinator = f.coordinator.clone();
            async move { coordinator.refresh().await }
        });
        while f.http.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let tokens = f.tokens.clone();
        f.session.reset_with(|| {
            let _ = tokens.clear_all();
        });
        f.coordinator.invalidate();
        f.http.gate.notify_one();

        assert!(matches!(pending.await.unwrap(), Err(AuthError::Superseded)));
        assert!(f.tokens.load().unwrap().is_empty());
        assert_eq!(f.session.access_token(), None);
    }

    #[tokio::test]
    async fn test_rejected_token_already_replaced_skips_network() {
        let f = fixture(200);
        f.session.update_if_current(f.generation, |state| {
            state.access_token = Some("newer".to_string());
        });

        assert_eq!(f.coordinator.refresh_rejected("stale").await.unwrap(), "newer");
        assert_eq!(f.http.calls.load(Ordering::SeqCst), 0);

        f.http.gate.notify_one();
        assert_eq!(f.coordinator.refresh_rejected("newer").await.unwrap(), "fresh-1");
        assert_eq!(f.http.calls.load(Ordering::SeqCst), 1);
    }
}
