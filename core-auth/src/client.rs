//! # Authorized HTTP Client
//!
//! Wraps the host [`HttpClient`] for calls that need the session's access
//! token. The token travels as the `access_token` query parameter, which is
//! what the backend's feature endpoints read.
//!
//! On 401/403 the request is retried at most once:
//!
//! 1. If another caller already replaced the token the request used, resend
//!    with the current token
//! 2. Otherwise join (or start) the single-flight refresh and resend with the
//!    token it produced
//!
//! Both cases go through [`RefreshCoordinator::refresh_rejected`].
//!
//! A failed refresh propagates the original authorization error. Requests
//! with a non-idempotent method are only retried when marked
//! [`AuthorizedRequest::idempotent`].

use crate::api::{send_with_timeout, ACCESS_TOKEN_PARAM};
use crate::error::{ApiError, AuthError, Result};
use crate::refresh::RefreshCoordinator;
use crate::session::Session;
use bridge_traits::{HttpClient, HttpRequest, HttpResponse};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const AUTHORIZED_REQUEST: &str = "authorized request";

/// A request plus its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct AuthorizedRequest {
    request: HttpRequest,
    retried: bool,
    idempotent: Option<bool>,
}

impl AuthorizedRequest {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            retried: false,
            idempotent: None,
        }
    }

    /// Override whether replaying this request after a refresh is safe.
    ///
    /// By default this follows the HTTP method.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = Some(idempotent);
        self
    }

    /// Whether this request was already resent once.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    fn allows_replay(&self) -> bool {
        self.idempotent
            .unwrap_or_else(|| self.request.method.is_idempotent())
    }
}

impl From<HttpRequest> for AuthorizedRequest {
    fn from(request: HttpRequest) -> Self {
        Self::new(request)
    }
}

/// HTTP client that attaches the access token and recovers from expiry.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Arc<dyn HttpClient>,
    session: Session,
    refresh: RefreshCoordinator,
    base_url: String,
    timeout: Duration,
}

impl AuthorizedClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        session: Session,
        refresh: RefreshCoordinator,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            session,
            refresh,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Absolute URL of a backend endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Send `request` with the current access token.
    ///
    /// Any non-success status is returned as [`AuthError::Api`].
    #[instrument(skip_all, fields(method = request.request.method.as_str(), url = %request.request.url))]
    async fn send(&self, mut request: AuthorizedRequest) -> Result<HttpResponse> {
        let mut token = self.session.access_token();

        loop {
            let mut outgoing = request.request.clone();
            if let Some(token) = &token {
                outgoing.set_query(ACCESS_TOKEN_PARAM, token.clone());
            }

            let response =
                send_with_timeout(self.http.as_ref(), AUTHORIZED_REQUEST, outgoing, self.timeout)
                    .await
                    .map_err(AuthError::Api)?;

            if response.is_success() {
                return Ok(response);
            }

            let error = ApiError::from_response(AUTHORIZED_REQUEST, &response);
            if !error.is_unauthorized() {
                debug!(status = response.status, "Request refused");
                return Err(AuthError::Api(error));
            }

            if request.retried {
                warn!(status = response.status, "Request refused again after retry");
                return Err(AuthError::Api(error));
            }

            if !request.allows_replay() {
                warn!(status = response.status, "Not replaying non-idempotent request");
                return Err(AuthError::Api(error));
            }

            let Some(used) = token.take() else {
                debug!("Request sent without a token was refused");
                return Err(AuthError::Api(error));
            };
            request.retried = true;

            match self.refresh.refresh_rejected(&used).await {
                Ok(fresh) => {
                    debug!("Resending request with replacement token");
                    token = Some(fresh);
                }
                Err(refresh_error) => {
                    warn!(error = %refresh_error, "Refresh failed, propagating original error");
                    return Err(AuthError::Api(error));
                }
            }
        }
    }

    /// Execute an authorized request.
    pub async fn execute(&self, request: impl Into<AuthorizedRequest>) -> Result<HttpResponse> {
        self.send(request.into()).await
    }

    /// `GET {base}/{path}` and decode the JSON body.
    pub async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = query
            .iter()
            .fold(HttpRequest::get(self.endpoint(path)), |request, (key, value)| {
                request.query(*key, *value)
            });

        let response = self.execute(request).await?;
        serde_json::from_slice(&response.body).map_err(|e| {
            warn!(path, error = %e, "Undecodable response body");
            AuthError::Api(ApiError::malformed(AUTHORIZED_REQUEST, response.status, e))
        })
    }
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AuthApi;
    use crate::error::ErrorKind;
    use crate::token_store::TokenStore;
    use async_trait::async_trait;
    use bridge_desktop::MemoryKeyValueStore;
    use bridge_traits::HttpMethod;
    use core_runtime::events::EventBus;
    use std::sync::Mutex;

    /// Backend accepting only `valid` as access token and minting `minted` on refresh.
    struct Backend {
        valid: &'static str,
        minted: &'static str,
        refresh_status: u16,
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    impl Backend {
        fn new(valid: &'static str, refresh_status: u16) -> Arc<Self> {
            Arc::new(Self {
                valid,
                minted: valid,
                refresh_status,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn minting(valid: &'static str, minted: &'static str) -> Arc<Self> {
            Arc::new(Self {
                valid,
                minted,
                refresh_status: 200,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls_to(&self, suffix: &str) -> usize {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|(url, _)| url.ends_with(suffix))
                .count()
        }
    }

    #[async_trait]
    impl HttpClient for Backend {
        async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            let token = request.query_value("access_token").map(str::to_string);
            self.seen
                .lock()
                .unwrap()
                .push((request.url.clone(), token.clone()));

            if request.url.ends_with("/refresh_token") {
                let body = format!(r#"{{"access_token":"{}"}}"#, self.minted);
                return Ok(HttpResponse::new(self.refresh_status, body));
            }
            if request.url.ends_with("/missing") {
                return Ok(HttpResponse::new(404, r#"{"error":"not found"}"#));
            }
            match token.as_deref() {
                Some(token) if token == self.valid => {
                    Ok(HttpResponse::new(200, r#"{"items":[1,2]}"#))
                }
                _ => Ok(HttpResponse::new(401, "")),
            }
        }
    }

    fn client(backend: Arc<Backend>, access: &str) -> (AuthorizedClient, Session) {
        let store = Arc::new(MemoryKeyValueStore::with_entries([
            ("token", access),
            ("refreshToken", "R"),
        ]));
        let tokens = TokenStore::new(store, "token", "refreshToken");
        let session = Session::new();
        let generation = session.begin_bootstrap();
        session.update_if_current(generation, |state| {
            state.access_token = Some(access.to_string());
            state.refresh_token = Some("R".to_string());
            state.loading = false;
        });

        let base = "http://backend.test/api";
        let timeout = Duration::from_secs(5);
        let api = AuthApi::new(backend.clone(), base, timeout);
        let refresh = RefreshCoordinator::new(api, tokens, session.clone(), EventBus::default());
        let client = AuthorizedClient::new(backend, session.clone(), refresh, base, timeout);
        (client, session)
    }

    #[derive(Debug, serde::Deserialize)]
    struct Items {
        items: Vec<u32>,
    }

    #[tokio::test]
    async fn test_attaches_access_token() {
        let backend = Backend::new("T", 200);
        let (client, _) = client(backend.clone(), "T");

        let items: Items = client.get_json("/playlists", &[("limit", "5")]).await.unwrap();

        assert_eq!(items.items, vec![1, 2]);
        assert_eq!(backend.calls_to("/refresh_token"), 0);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].0, "http://backend.test/api/playlists");
        assert_eq!(seen[0].1.as_deref(), Some("T"));
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_retries_once() {
        let backend = Backend::new("T2", 200);
        let (client, session) = client(backend.clone(), "T");

        let items: Items = client.get_json("playlists", &[]).await.unwrap();

        assert_eq!(items.items, vec![1, 2]);
        assert_eq!(backend.calls_to("/refresh_token"), 1);
        assert_eq!(backend.calls_to("/playlists"), 2);
        assert_eq!(session.access_token().as_deref(), Some("T2"));
    }

    #[tokio::test]
    async fn test_second_refusal_is_not_retried_again() {
        let backend = Backend::minting("T2", "T3");
        let (client, _) = client(backend.clone(), "T");

        let error = client.get_json::<Items>("/playlists", &[]).await.unwrap_err();

        assert_eq!(error.api_error().unwrap().status, Some(401));
        assert_eq!(backend.calls_to("/playlists"), 2);
        assert_eq!(backend.calls_to("/refresh_token"), 1);
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.last().unwrap().1.as_deref(), Some("T3"));
    }

    #[tokio::test]
    async fn test_failed_refresh_propagates_original_error() {
        let backend = Backend::new("T2", 400);
        let (client, session) = client(backend.clone(), "T");

        let error = client.get_json::<Items>("/playlists", &[]).await.unwrap_err();

        let api = error.api_error().unwrap();
        assert_eq!(api.status, Some(401));
        assert_eq!(api.kind, ErrorKind::Unauthorized);
        assert_eq!(backend.calls_to("/playlists"), 1);
        assert_eq!(session.access_token(), None);
    }

    #[tokio::test]
    async fn test_non_idempotent_request_is_not_replayed() {
        let backend = Backend::new("T2", 200);
        let (client, _) = client(backend.clone(), "T");

        let request = HttpRequest::new(HttpMethod::Post, client.endpoint("/playlists"));
        let error = client.execute(request).await.unwrap_err();

        assert_eq!(error.api_error().unwrap().status, Some(401));
        assert_eq!(backend.calls_to("/refresh_token"), 0);

        let request = HttpRequest::new(HttpMethod::Post, client.endpoint("/playlists"));
        let response = client
            .execute(AuthorizedRequest::new(request).idempotent(true))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(backend.calls_to("/refresh_token"), 1);
    }

    #[tokio::test]
    async fn test_other_client_errors_are_not_retried() {
        let backend = Backend::new("T", 200);
        let (client, _) = client(backend.clone(), "T");

        let error = client.get_json::<Items>("/missing", &[]).await.unwrap_err();

        let api = error.api_error().unwrap();
        assert_eq!(api.kind, ErrorKind::Rejected);
        assert_eq!(api.payload, Some(serde_json::json!({"error": "not found"})));
        assert_eq!(backend.calls_to("/refresh_token"), 0);
    }
}
