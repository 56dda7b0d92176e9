//! Redirect Location Abstraction
//!
//! The login callback delivers credentials in the fragment of the URL the
//! host was redirected to (`https://app/#access_token=...`). This trait gives
//! the core one-shot access to that fragment.

use crate::platform::PlatformSendSync;

/// Host location carrying the login-callback fragment.
///
/// - Web: `window.location.hash`, cleared with `history.replaceState`
/// - Desktop: the callback URL captured from a deep link or loopback listener
pub trait RedirectLocation: PlatformSendSync {
    /// Return the current fragment (without the leading `#`) and strip it from
    /// the visible location in the same step.
    ///
    /// A second call returns `None` until a new redirect arrives. Returns
    /// `None` for an absent or empty fragment.
    fn take_fragment(&self) -> Option<String>;

    /// Peek at the fragment without clearing it.
    fn fragment(&self) -> Option<String>;
}

/// Location for hosts that never receive redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRedirect;

impl RedirectLocation for NoRedirect {
    fn take_fragment(&self) -> Option<String> {
        None
    }

    fn fragment(&self) -> Option<String> {
        None
    }
}
