//! `window.location` implementation of the `RedirectLocation` bridge trait.

use bridge_traits::location::RedirectLocation;
use tracing::warn;
use wasm_bindgen::JsValue;
use web_sys::Window;

use crate::error::{js_error, window};

/// The browser's current location.
///
/// Taking the fragment rewrites the history entry to the same path and
/// query without the `#...` part. The tokens leave the address bar and a
/// reload does not deliver them again.
pub struct BrowserLocation {
    window: Window,
}

impl BrowserLocation {
    /// Location of the current browser window.
    pub fn new() -> bridge_traits::error::Result<Self> {
        Ok(Self { window: window()? })
    }

    fn hash(&self) -> Option<String> {
        let hash = self.window.location().hash().ok()?;
        let fragment = hash.strip_prefix('#').unwrap_or(&hash);
        (!fragment.is_empty()).then(|| fragment.to_string())
    }

    fn strip_hash(&self) {
        let location = self.window.location();
        let replaced = location
            .pathname()
            .and_then(|path| Ok(format!("{path}{}", location.search()?)))
            .and_then(|url| {
                self.window
                    .history()?
                    .replace_state_with_url(&JsValue::NULL, "", Some(&url))
            });

        if let Err(err) = replaced {
            warn!(error = %js_error("history.replaceState", err), "Falling back to clearing location.hash");
            if let Err(err) = location.set_hash("") {
                warn!(error = %js_error("location.hash", err), "Redirect fragment left in place");
            }
        }
    }
}

impl RedirectLocation for BrowserLocation {
    fn take_fragment(&self) -> Option<String> {
        let fragment = self.hash()?;
        self.strip_hash();
        Some(fragment)
    }

    fn fragment(&self) -> Option<String> {
        self.hash()
    }
}
