//! Login callback fragment parsing.
//!
//! The backend finishes the authorization flow by redirecting to
//! `/#access_token=...&refresh_token=...`. The fragment is form-encoded. When
//! no refresh token was issued the backend writes the literal `None`, so
//! placeholder values are treated as absent.

use std::fmt;
use tracing::{debug, warn};

const ACCESS_TOKEN_PARAM: &str = "access_token";
const REFRESH_TOKEN_PARAM: &str = "refresh_token";

/// Placeholder values some callback writers emit instead of omitting a field.
const ABSENT_MARKERS: &[&str] = &["None", "null", "undefined"];

/// Tokens delivered by the login callback.
#[derive(Clone, PartialEq, Eq)]
pub struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RedirectTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedirectTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn present(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || ABSENT_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a callback fragment (with or without the leading `#`).
///
/// Returns `None` when the fragment carries no usable access token. The first
/// occurrence of each parameter wins.
pub fn parse_fragment(fragment: &str) -> Option<RedirectTokens> {
    let fragment = fragment.trim_start_matches('#');
    if fragment.is_empty() {
        return None;
    }

    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(fragment) {
        Ok(pairs) => pairs,
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable redirect fragment");
            return None;
        }
    };

    let first = |name: &str| {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| present(value.clone()))
    };

    let Some(access_token) = first(ACCESS_TOKEN_PARAM) else {
        debug!("Redirect fragment has no access token");
        return None;
    };

    Some(RedirectTokens {
        access_token,
        refresh_token: first(REFRESH_TOKEN_PARAM),
    })
}
