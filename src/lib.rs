//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `bridge-desktop`, `bridge-wasm`).
//! Host applications can depend on `aurafy-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "wasm"))]
pub use core_service::CoreService;

#[cfg(feature = "desktop-shims")]
pub use core_service::bootstrap_desktop;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub use core_service::{bootstrap_wasm, WasmBridgeConfig};
