//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `KeyValueStore` backed by a JSON file in the platform data directory
//! - `KeyValueStore` backed by the OS keychain via the `keyring` crate
//! - `KeyValueStore` in memory, for tests and ephemeral sessions
//! - `RedirectLocation` fed from a captured callback URL
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileKeyValueStore, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let storage = FileKeyValueStore::in_data_dir("aurafy")?;
//! ```

mod file_store;
mod http;
mod location;
mod memory;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use file_store::FileKeyValueStore;
pub use http::ReqwestHttpClient;
pub use location::CallbackLocation;
pub use memory::MemoryKeyValueStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringKeyValueStore;
