//! # Session State
//!
//! The single in-memory source of truth for authentication state.
//!
//! `Session` is a cheap-to-clone handle owned by the composition root and
//! passed to every consumer. State is held in a `tokio::sync::watch` channel
//! so a UI can await changes and re-run its route gate.
//!
//! ## Generations
//!
//! Every async operation captures [`Session::generation`] when it starts and
//! commits through [`Session::update_if_current`]. Logout and bootstrap bump
//! the generation, so a slow identity probe or refresh that settles afterwards
//! finds a newer generation and its result is dropped. The check and the
//! write happen under the same lock.
//!
//! ## Persistence
//!
//! Storage writes that must agree with the state (a refreshed token, a
//! cleared pair) run under a separate writer lock, outside the state lock.
//! Readers never wait on storage I/O, and a reset cannot slip in between a
//! write and the state change it belongs to.

use crate::types::{SessionSnapshot, SessionStatus, UserProfile};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// Shared handle to the session state.
#[derive(Clone)]
pub struct Session {
    state: Arc<watch::Sender<SessionSnapshot>>,
    writer: Arc<Mutex<()>>,
}

impl Session {
    /// Create an empty session.
    ///
    /// The session starts with `loading = true`: no gate decision can be made
    /// until bootstrap has run.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionSnapshot {
            loading: true,
            ..SessionSnapshot::default()
        });
        Self {
            state: Arc::new(state),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token.clone()
    }

    pub fn identity(&self) -> Option<UserProfile> {
        self.state.borrow().identity.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Start a new bootstrap pass: bump the generation and set `loading`.
    ///
    /// Returns the generation the pass must commit under.
    pub(crate) fn begin_bootstrap(&self) -> u64 {
        let _writer = self.lock_writer();
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.loading = true;
            generation = state.generation;
        });
        debug!(generation, "Bootstrap generation started");
        generation
    }

    /// Apply `f` only if the session is still at `generation`.
    ///
    /// Returns `None` (and leaves the state untouched) when the generation
    /// moved on. Subscribers are notified only when `f` ran.
    pub(crate) fn update_if_current<F, T>(&self, generation: u64, f: F) -> Option<T>
    where
        F: FnOnce(&mut SessionSnapshot) -> T,
    {
        let mut output = None;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            output = Some(f(state));
            debug_assert!(state.is_consistent(), "session invariant violated");
            true
        });

        if output.is_none() {
            debug!(
                stale = generation,
                current = self.generation(),
                "Discarding result from superseded session generation"
            );
        }
        output
    }

    /// Run `persist` only if the session is still at `generation`.
    ///
    /// Returns `None` without calling `persist` when the generation moved on.
    pub(crate) fn persist_if_current<P, R>(&self, generation: u64, persist: P) -> Option<R>
    where
        P: FnOnce() -> R,
    {
        let _writer = self.lock_writer();
        if self.generation() != generation {
            debug!(
                stale = generation,
                current = self.generation(),
                "Skipping storage write for superseded session generation"
            );
            return None;
        }
        Some(persist())
    }

    /// Run `persist`, then apply `f`, both only at `generation`.
    ///
    /// Storage I/O happens outside the state lock. Generation changes all
    /// take the writer lock, so once `persist` ran the state update applies.
    pub(crate) fn persist_and_update<P, R, F, T>(
        &self,
        generation: u64,
        persist: P,
        f: F,
    ) -> Option<(R, T)>
    where
        P: FnOnce() -> R,
        F: FnOnce(&mut SessionSnapshot) -> T,
    {
        let _writer = self.lock_writer();
        if self.generation() != generation {
            debug!(
                stale = generation,
                current = self.generation(),
                "Discarding result from superseded session generation"
            );
            return None;
        }
        let persisted = persist();
        self.update_if_current(generation, f)
            .map(|output| (persisted, output))
    }

    /// Clear every credential, bump the generation, and end loading.
    ///
    /// `on_reset` runs first, under the writer lock, so no storage write of
    /// an older generation can land after it.
    pub(crate) fn reset_with<F>(&self, on_reset: F)
    where
        F: FnOnce(),
    {
        let _writer = self.lock_writer();
        on_reset();
        self.state.send_modify(|state| {
            state.clear_credentials();
            state.loading = false;
            state.generation += 1;
        });
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Session").field(&*self.state.borrow()).finish()
    }
}
