//! # Session Bootstrap
//!
//! Runs once at process start (and again only if the host explicitly asks)
//! to turn whatever credentials are available into a session state.
//!
//! ```text
//! Start -> ExtractFromRedirect -> ResolveToken -> Validate
//!       -> Authenticated
//!       -> AttemptRefresh -> Authenticated | Unauthenticated
//! ```
//!
//! The redirect fragment is taken with clear-on-read semantics, so a second
//! pass never sees the same delivered pair. Every pass captures a fresh
//! session generation; if logout or a newer pass moves it, this pass returns
//! [`AuthError::Superseded`] and leaves the state to its successor.

use crate::api::AuthApi;
use crate::error::{ApiError, AuthError, Result};
use crate::fragment::parse_fragment;
use crate::refresh::RefreshCoordinator;
use crate::session::Session;
use crate::token_store::TokenStore;
use crate::types::{SessionSnapshot, SessionStatus, UserProfile};
use bridge_traits::RedirectLocation;
use core_runtime::events::{EventBus, SessionEvent};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Bootstrap stage, recorded on log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    ExtractFromRedirect,
    ResolveToken,
    Validate,
    AttemptRefresh,
}

/// Credentials resolved for validation.
struct Resolved {
    access_token: String,
    refresh_token: Option<String>,
}

/// Bootstrap state machine.
#[derive(Clone)]
pub struct AuthInitializer {
    api: AuthApi,
    tokens: TokenStore,
    session: Session,
    refresh: RefreshCoordinator,
    location: Arc<dyn RedirectLocation>,
    events: EventBus,
}

impl AuthInitializer {
    pub fn new(
        api: AuthApi,
        tokens: TokenStore,
        session: Session,
        refresh: RefreshCoordinator,
        location: Arc<dyn RedirectLocation>,
        events: EventBus,
    ) -> Self {
        Self {
            api,
            tokens,
            session,
            refresh,
            location,
            events,
        }
    }

    /// Run one bootstrap pass.
    ///
    /// `loading` is cleared on every exit except [`AuthError::Superseded`],
    /// where a newer pass or a logout owns the state.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<UserProfile> {
        let generation = self.session.begin_bootstrap();
        let _ = self.events.emit(SessionEvent::Bootstrapping);
        info!(generation, "Session bootstrap started");

        let outcome = self.bootstrap(generation).await;

        match &outcome {
            Ok(profile) => {
                info!(user_id = %profile.id, "Session authenticated");
                let _ = self.events.emit(SessionEvent::SignedIn {
                    user_id: profile.id.clone(),
                });
            }
            Err(AuthError::Superseded) => {
                info!("Bootstrap superseded, leaving session to the newer owner");
            }
            Err(error) => {
                self.session.update_if_current(generation, |state| {
                    if state.status == SessionStatus::Validating {
                        state.status = SessionStatus::Unauthenticated;
                    }
                    state.loading = false;
                });
                info!(error = %error, status = %self.session.status(), "Bootstrap finished without a session");
            }
        }

        outcome
    }

    async fn bootstrap(&self, generation: u64) -> Result<UserProfile> {
        let extracted = self.extract_from_redirect(generation)?;

        debug!(stage = ?Stage::ResolveToken);
        let Some(resolved) = self.resolve_token(extracted)? else {
            self.commit(generation, |state| {
                state.clear_credentials();
                state.loading = false;
            })?;
            return Err(AuthError::AuthMissing);
        };

        debug!(stage = ?Stage::Validate);
        self.commit(generation, |state| {
            state.access_token = Some(resolved.access_token.clone());
            state.refresh_token = resolved.refresh_token.clone();
            state.identity = None;
            state.status = SessionStatus::Validating;
        })?;

        match self.api.fetch_identity(&resolved.access_token).await {
            Ok(profile) => self.authenticate(generation, profile),
            Err(error) if error.is_unauthorized() => {
                self.attempt_refresh(generation, resolved.refresh_token.is_some(), error)
                    .await
            }
            Err(error) => Err(self.keep_credentials(generation, AuthError::ProbeTransient(error))?),
        }
    }

    /// Take the callback fragment and persist any tokens it carries.
    ///
    /// The fragment is gone once taken, so a failed write only costs the
    /// tokens surviving a restart. This pass still validates them.
    fn extract_from_redirect(&self, generation: u64) -> Result<Option<Resolved>> {
        debug!(stage = ?Stage::ExtractFromRedirect);

        let Some(fragment) = self.location.take_fragment() else {
            return Ok(None);
        };
        let Some(delivered) = parse_fragment(&fragment) else {
            debug!("Redirect fragment carried no tokens");
            return Ok(None);
        };

        let saved = self
            .session
            .persist_if_current(generation, || {
                self.tokens
                    .save_pair(&delivered.access_token, delivered.refresh_token.as_deref())
            })
            .ok_or(AuthError::Superseded)?;
        match saved {
            Ok(()) => info!(
                has_refresh_token = delivered.refresh_token.is_some(),
                "Stored tokens from login redirect"
            ),
            Err(e) => warn!(error = %e, "Redirect tokens kept in memory only"),
        }

        Ok(Some(Resolved {
            access_token: delivered.access_token,
            refresh_token: delivered.refresh_token,
        }))
    }

    /// Prefer just-delivered tokens, else the persisted pair.
    fn resolve_token(&self, extracted: Option<Resolved>) -> Result<Option<Resolved>> {
        if extracted.is_some() {
            return Ok(extracted);
        }

        let stored = self.tokens.load()?;
        Ok(stored.access_token.map(|access_token| Resolved {
            access_token,
            refresh_token: stored.refresh_token,
        }))
    }

    async fn attempt_refresh(
        &self,
        generation: u64,
        has_refresh_token: bool,
        rejection: ApiError,
    ) -> Result<UserProfile> {
        if !has_refresh_token {
            info!("Access token rejected and no refresh token available");
            return Err(self.end_session(generation, rejection.to_string())?);
        }

        debug!(stage = ?Stage::AttemptRefresh);
        let fresh = match self.refresh.refresh().await {
            Ok(token) => token,
            Err(error @ AuthError::RefreshTransient(_)) => {
                return Err(self.keep_credentials(generation, error)?);
            }
            Err(error) if error.is_fatal() => {
                // The coordinator already cleared storage and credentials.
                self.commit(generation, |state| {
                    state.clear_credentials();
                    state.loading = false;
                })?;
                return Err(AuthError::AuthInvalid(error.to_string()));
            }
            Err(AuthError::Superseded) => return Err(AuthError::Superseded),
            Err(error) => return Err(self.keep_credentials(generation, error)?),
        };

        match self.api.fetch_identity(&fresh).await {
            Ok(profile) => self.authenticate(generation, profile),
            Err(error) if error.is_transient() => {
                Err(self.keep_credentials(generation, AuthError::ProbeTransient(error))?)
            }
            Err(error) => {
                warn!(error = %error, "Refreshed token rejected by identity probe");
                Err(self.end_session(generation, error.to_string())?)
            }
        }
    }

    fn authenticate(&self, generation: u64, profile: UserProfile) -> Result<UserProfile> {
        self.commit(generation, |state| {
            state.identity = Some(profile.clone());
            state.status = SessionStatus::Authenticated;
            state.loading = false;
        })?;
        Ok(profile)
    }

    /// Finish unauthenticated while keeping every stored credential.
    ///
    /// Returns `error` for the caller to propagate.
    fn keep_credentials(&self, generation: u64, error: AuthError) -> Result<AuthError> {
        warn!(error = %error, "Bootstrap could not validate, credentials kept");
        self.commit(generation, |state| {
            state.identity = None;
            state.status = SessionStatus::Unauthenticated;
            state.loading = false;
        })?;

        let _ = self.events.emit(SessionEvent::AuthError {
            message: error.to_string(),
            recoverable: true,
        });
        Ok(error)
    }

    /// Clear both stores and finish unauthenticated.
    ///
    /// Returns the `AuthInvalid` error for the caller to propagate.
    fn end_session(&self, generation: u64, reason: String) -> Result<AuthError> {
        let (cleared, ()) = self
            .session
            .persist_and_update(
                generation,
                || self.tokens.clear_all(),
                |state| {
                    state.clear_credentials();
                    state.loading = false;
                },
            )
            .ok_or(AuthError::Superseded)?;

        if let Err(e) = cleared {
            warn!(error = %e, "Failed to clear rejected tokens");
        }

        let _ = self.events.emit(SessionEvent::AuthError {
            message: reason.clone(),
            recoverable: false,
        });
        let _ = self.events.emit(SessionEvent::SignedOut);
        Ok(AuthError::AuthInvalid(reason))
    }

    fn commit<F>(&self, generation: u64, f: F) -> Result<()>
    where
        F: FnOnce(&mut SessionSnapshot),
    {
        self.session
            .update_if_current(generation, f)
            .ok_or(AuthError::Superseded)
    }
}

impl std::fmt::Debug for AuthInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInitializer")
            .field("api", &self.api)
            .field("tokens", &self.tokens)
            .finish()
    }
}
