//! # Session Authentication Core
//!
//! Keeps an access/refresh token pair alive for a client of an
//! OAuth-protected backend.
//!
//! ## Overview
//!
//! This crate restores a session at process start, validates it against the
//! backend's identity probe, transparently refreshes expired access tokens
//! for in-flight requests, gates protected views, and ends the session on
//! logout.
//!
//! ## Features
//!
//! - Login callback fragment extraction with clear-on-read semantics
//! - Durable token persistence through a host key-value store
//! - Single-flight token refresh shared by every concurrent caller
//! - Retry-once interceptor for authorized requests
//! - Session generations so late async results never resurrect a session
//! - Session event emission

pub mod api;
pub mod client;
pub mod error;
pub mod fragment;
pub mod gate;
pub mod initializer;
pub mod manager;
pub mod refresh;
pub mod session;
pub mod token_store;
pub mod types;

pub use api::{AuthApi, RefreshGrant};
pub use client::{AuthorizedClient, AuthorizedRequest};
pub use error::{ApiError, AuthError, ErrorKind, Result};
pub use fragment::{parse_fragment, RedirectTokens};
pub use gate::{GateDecision, RouteGate};
pub use initializer::AuthInitializer;
pub use manager::AuthManager;
pub use refresh::RefreshCoordinator;
pub use session::Session;
pub use token_store::TokenStore;
pub use types::{
    Followers, PersistedTokens, ProfileImage, SessionSnapshot, SessionStatus, UserProfile,
};
