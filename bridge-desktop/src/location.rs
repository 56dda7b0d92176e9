//! Redirect location fed from a captured callback URL

use bridge_traits::location::RedirectLocation;
use std::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

/// Holds the fragment of the most recent login callback.
///
/// Desktop hosts receive the callback through a deep link or a loopback
/// listener. They hand the URL to [`CallbackLocation::capture_url`] and the
/// session core consumes the fragment exactly once through
/// [`RedirectLocation::take_fragment`].
#[derive(Default)]
pub struct CallbackLocation {
    fragment: Mutex<Option<String>>,
}

impl CallbackLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a location that already carries `fragment` (without `#`).
    pub fn with_fragment(fragment: impl Into<String>) -> Self {
        let location = Self::new();
        location.set_fragment(Some(fragment.into()));
        location
    }

    /// Record the fragment of a callback URL. Returns whether one was present.
    pub fn capture_url(&self, callback: &str) -> bool {
        match Url::parse(callback) {
            Ok(url) => {
                let fragment = url.fragment().map(str::to_string);
                let present = fragment.as_deref().is_some_and(|f| !f.is_empty());
                debug!(has_fragment = present, "Captured callback URL");
                self.set_fragment(fragment);
                present
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed callback URL");
                false
            }
        }
    }

    fn set_fragment(&self, fragment: Option<String>) {
        let fragment = fragment.filter(|f| !f.is_empty());
        match self.fragment.lock() {
            Ok(mut slot) => *slot = fragment,
            Err(poisoned) => *poisoned.into_inner() = fragment,
        }
    }
}

impl RedirectLocation for CallbackLocation {
    fn take_fragment(&self) -> Option<String> {
        match self.fragment.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn fragment(&self) -> Option<String> {
        match self.fragment.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_fragment_is_one_shot() {
        let location = CallbackLocation::new();
        assert!(location.capture_url("http://localhost:3000/#access_token=a&refresh_token=b"));

        assert_eq!(
            location.fragment().as_deref(),
            Some("access_token=a&refresh_token=b")
        );
        assert_eq!(
            location.take_fragment().as_deref(),
            Some("access_token=a&refresh_token=b")
        );
        assert_eq!(location.take_fragment(), None);
    }

    #[test]
    fn test_url_without_fragment() {
        let location = CallbackLocation::new();
        assert!(!location.capture_url("http://localhost:3000/"));
        assert!(!location.capture_url("http://localhost:3000/#"));
        assert_eq!(location.take_fragment(), None);
    }

    #[test]
    fn test_malformed_url_is_ignored() {
        let location = CallbackLocation::with_fragment("access_token=a");
        assert!(!location.capture_url("not a url"));
        assert_eq!(location.fragment().as_deref(), Some("access_token=a"));
    }
}
