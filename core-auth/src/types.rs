use serde::{Deserialize, Serialize};
use std::fmt;

/// Authentication status of the session.
///
/// This is the only value UI consumers should branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No validated credential.
    #[default]
    Unauthenticated,
    /// A credential is being checked against the identity probe.
    Validating,
    /// The identity probe accepted the current access token.
    Authenticated,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Unauthenticated => "Unauthenticated",
            SessionStatus::Validating => "Validating",
            SessionStatus::Authenticated => "Authenticated",
        };
        f.write_str(name)
    }
}

/// Profile image reference as returned by the identity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileImage {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

/// Read-only snapshot of the signed-in user.
///
/// Unknown fields in the probe response are ignored. The email is personal
/// data and is left out of `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub images: Vec<ProfileImage>,
    #[serde(default)]
    pub followers: Followers,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserProfile {
    /// URL of the first profile image.
    pub fn avatar_url(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }

    pub fn follower_count(&self) -> u64 {
        self.followers.total
    }
}

impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("images", &self.images.len())
            .field("followers", &self.followers.total)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Durable image of the token pair.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PersistedTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl PersistedTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

// Custom Debug implementation to avoid logging sensitive tokens
impl fmt::Debug for PersistedTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedTokens")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Published state of the session.
///
/// Invariant: `identity.is_some()` implies `status == Authenticated`, which
/// implies `access_token.is_some()`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub identity: Option<UserProfile>,
    pub status: SessionStatus,
    /// True only while bootstrap is running.
    pub loading: bool,
    /// Bumped by logout and by every bootstrap. Async results captured under
    /// an older generation are discarded.
    pub generation: u64,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Check the identity/status/token invariant.
    pub fn is_consistent(&self) -> bool {
        let identity_ok = self.identity.is_none() || self.is_authenticated();
        let status_ok = !self.is_authenticated() || self.access_token.is_some();
        identity_ok && status_ok
    }

    /// Drop tokens and identity and mark the session unauthenticated.
    pub(crate) fn clear_credentials(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.identity = None;
        self.status = SessionStatus::Unauthenticated;
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("identity", &self.identity)
            .field("status", &self.status)
            .field("loading", &self.loading)
            .field("generation", &self.generation)
            .finish()
    }
}
