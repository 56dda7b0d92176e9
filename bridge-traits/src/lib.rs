//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the session core and the host it
//! runs in. Each trait represents a capability the core requires but that is
//! implemented differently per platform (browser, desktop, tests).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with timeouts and retry
//! - [`KeyValueStore`](storage::KeyValueStore) - Durable string storage surviving reloads
//! - [`RedirectLocation`](location::RedirectLocation) - One-shot access to the login-callback fragment
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. A
//! non-2xx HTTP status is a successful [`HttpResponse`](http::HttpResponse),
//! not a `BridgeError`; errors are reserved for transport failures so that the
//! core can tell an upstream rejection from a connectivity problem.
//!
//! ## Thread Safety
//!
//! On native targets every bridge trait requires `Send + Sync` so it can be
//! shared across async tasks. On `wasm32` the bound is dropped through
//! [`PlatformSendSync`](platform::PlatformSendSync), because browser handles
//! are single-threaded.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Implementation
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod location;
pub mod logging;
pub mod platform;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use location::{NoRedirect, RedirectLocation};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use platform::PlatformSendSync;
pub use storage::KeyValueStore;
