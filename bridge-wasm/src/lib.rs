//! WebAssembly Bridge Implementations
//!
//! Browser implementations of the `bridge-traits` seams the session core
//! needs, built on `web-sys` and `wasm-bindgen`.
//!
//! # Platform Support
//!
//! This crate is designed exclusively for the `wasm32-unknown-unknown` target.
//! On native targets it compiles to an empty crate.
//!
//! # Implementations
//!
//! - [`WasmHttpClient`]: `fetch` with `AbortController` timeouts
//! - [`LocalKeyValueStore`]: `window.localStorage`
//! - [`BrowserLocation`]: `window.location.hash`, stripped with
//!   `history.replaceState`
//!
//! # Examples
//!
//! ```ignore
//! use bridge_wasm::{build_wasm_bridges, WasmBridgeConfig};
//!
//! let bridges = build_wasm_bridges(WasmBridgeConfig::default())?;
//! let fragment = bridges.redirect_location.take_fragment();
//! ```

#![cfg(target_arch = "wasm32")]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod error;
pub mod http;
pub mod location;
pub mod storage;

// Re-export commonly used types
pub use bootstrap::{build_wasm_bridges, WasmBridgeConfig, WasmBridgeSet};
pub use http::WasmHttpClient;
pub use location::BrowserLocation;
pub use storage::LocalKeyValueStore;
