//! Route gating for protected views.
//!
//! The gate only reads session state. While bootstrap is running it answers
//! [`GateDecision::Placeholder`] and makes no redirect decision. Afterwards,
//! protected content renders only for an authenticated session; everyone
//! else is sent to the login route with the requested location attached as
//! `next`, so it can be restored after login.

use crate::session::Session;
use crate::types::SessionSnapshot;
use tracing::debug;

const NEXT_PARAM: &str = "next";

/// What a host should show for a protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Bootstrap has not finished; render a neutral placeholder.
    Placeholder,
    /// Render the requested view.
    Render,
    /// Navigate to `to` instead.
    Redirect { to: String },
}

impl GateDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, GateDecision::Render)
    }
}

/// Guard for protected routes.
#[derive(Debug, Clone)]
pub struct RouteGate {
    login_route: String,
}

impl RouteGate {
    pub fn new(login_route: impl Into<String>) -> Self {
        Self {
            login_route: login_route.into(),
        }
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    /// Decide from a snapshot of the session.
    pub fn decide(&self, snapshot: &SessionSnapshot, requested: &str) -> GateDecision {
        if snapshot.loading {
            return GateDecision::Placeholder;
        }
        if snapshot.is_authenticated() {
            return GateDecision::Render;
        }

        let to = self.login_redirect(requested);
        debug!(requested, to = %to, "Redirecting unauthenticated visitor");
        GateDecision::Redirect { to }
    }

    /// Wait for bootstrap to finish, then decide.
    pub async fn resolve(&self, session: &Session, requested: &str) -> GateDecision {
        let mut receiver = session.subscribe();
        let snapshot = match receiver.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => session.snapshot(),
        };
        self.decide(&snapshot, requested)
    }

    /// Login route carrying `requested` as the return location.
    pub fn login_redirect(&self, requested: &str) -> String {
        if requested.is_empty() || requested == "/" || requested == self.login_route {
            return self.login_route.clone();
        }
        format!(
            "{}?{}={}",
            self.login_route,
            NEXT_PARAM,
            urlencoding::encode(requested)
        )
    }

    /// Extract a safe return location from the login view's query string.
    ///
    /// Only same-origin absolute paths are accepted.
    pub fn return_path(query: &str) -> Option<String> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_str(query.trim_start_matches('?')).ok()?;

        pairs
            .into_iter()
            .find(|(key, _)| key == NEXT_PARAM)
            .map(|(_, value)| value)
            .filter(|path| path.starts_with('/') && !path.starts_with("//"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionStatus, UserProfile};

    fn snapshot(status: SessionStatus, loading: bool) -> SessionSnapshot {
        let authenticated = status == SessionStatus::Authenticated;
        SessionSnapshot {
            access_token: authenticated.then(|| "T".to_string()),
            identity: authenticated.then(|| UserProfile {
                id: "u1".to_string(),
                ..UserProfile::default()
            }),
            status,
            loading,
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn test_loading_never_renders() {
        let gate = RouteGate::new("/login");
        for status in [
            SessionStatus::Unauthenticated,
            SessionStatus::Validating,
            SessionStatus::Authenticated,
        ] {
            assert_eq!(
                gate.decide(&snapshot(status, true), "/dashboard"),
                GateDecision::Placeholder
            );
        }
    }

    #[test]
    fn test_only_authenticated_renders() {
        let gate = RouteGate::new("/login");

        assert!(gate
            .decide(&snapshot(SessionStatus::Authenticated, false), "/dashboard")
            .is_render());

        for status in [SessionStatus::Unauthenticated, SessionStatus::Validating] {
            assert_eq!(
                gate.decide(&snapshot(status, false), "/playlist/37i9?tab=aura"),
                GateDecision::Redirect {
                    to: "/login?next=%2Fplaylist%2F37i9%3Ftab%3Daura".to_string()
                }
            );
        }
    }

    #[test]
    fn test_redirect_without_useful_location() {
        let gate = RouteGate::new("/login");
        assert_eq!(gate.login_redirect("/"), "/login");
        assert_eq!(gate.login_redirect(""), "/login");
        assert_eq!(gate.login_redirect("/login"), "/login");
    }

    #[test]
    fn test_return_path() {
        assert_eq!(
            RouteGate::return_path("?next=%2Fplaylist%2F37i9%3Ftab%3Daura").as_deref(),
            Some("/playlist/37i9?tab=aura")
        );
        assert_eq!(RouteGate::return_path("next=//evil.example"), None);
        assert_eq!(RouteGate::return_path("next=https://evil.example"), None);
        assert_eq!(RouteGate::return_path("other=1"), None);
    }

    #[tokio::test]
    async fn test_resolve_waits_for_bootstrap() {
        let gate = RouteGate::new("/login");
        let session = Session::new();
        let generation = session.begin_bootstrap();

        let pending = tokio::spawn({
            let gate = gate.clone();
            let session = session.clone();
            async move { gate.resolve(&session, "/dashboard").await }
        });
        tokio::task::yield_now().await;
        assert!(!pending.is_finished());

        session.update_if_current(generation, |state| {
            state.access_token = Some("T".to_string());
            state.identity = Some(UserProfile {
                id: "u1".to_string(),
                ..UserProfile::default()
            });
            state.status = SessionStatus::Authenticated;
            state.loading = false;
        });

        assert_eq!(pending.await.unwrap(), GateDecision::Render);
    }
}
