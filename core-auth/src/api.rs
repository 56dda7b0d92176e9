//! Backend auth endpoints.
//!
//! - `GET {base}/me?access_token=..` returns the user profile (identity probe)
//! - `GET {base}/refresh_token?refresh_token=..` mints a new access token
//! - `{base}/login` starts the external authorization redirect
//!
//! Every call is bounded by one explicit timeout.

use crate::error::ApiError;
use crate::types::UserProfile;
use bridge_traits::{BridgeError, HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::SessionConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub(crate) const ACCESS_TOKEN_PARAM: &str = "access_token";
const REFRESH_TOKEN_PARAM: &str = "refresh_token";

const IDENTITY_PROBE: &str = "identity probe";
const TOKEN_REFRESH: &str = "token refresh";

/// Result of a successful refresh call.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Present only when the backend rotates refresh tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("access_token", &"[REDACTED]")
            .field("rotated", &self.refresh_token.is_some())
            .finish()
    }
}

/// Send `request` with a deadline, mapping transport failures to
/// [`ApiError`]. Non-success statuses are returned as responses.
///
/// Native builds also race the call against a tokio timer. The browser has
/// no tokio timer; there the fetch client enforces `request.timeout` itself.
pub(crate) async fn send_with_timeout(
    http: &dyn HttpClient,
    operation: &'static str,
    request: HttpRequest,
    deadline: Duration,
) -> Result<HttpResponse, ApiError> {
    let call = http.execute(request.timeout(deadline));

    #[cfg(not(target_arch = "wasm32"))]
    let outcome = tokio::time::timeout(deadline, call)
        .await
        .unwrap_or(Err(BridgeError::Timeout(deadline)));
    #[cfg(target_arch = "wasm32")]
    let outcome = call.await;

    match outcome {
        Ok(response) => Ok(response),
        Err(BridgeError::Timeout(after)) => {
            warn!(operation, timeout_ms = after.as_millis() as u64, "Request timed out");
            Err(ApiError::timeout(operation, after))
        }
        Err(e) => {
            warn!(operation, error = %e, "Request failed before a response");
            Err(ApiError::transport(operation, &e))
        }
    }
}

/// Client for the backend's identity and refresh endpoints.
#[derive(Clone)]
pub struct AuthApi {
    http: Arc<dyn HttpClient>,
    base_url: String,
    timeout: Duration,
}

impl AuthApi {
    pub fn new(http: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            Arc::clone(&config.http_client),
            config.api_base_url.clone(),
            config.request_timeout,
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL the login view navigates to.
    pub fn login_url(&self) -> String {
        self.endpoint("login")
    }

    /// Validate `access_token` and fetch the profile it belongs to.
    #[instrument(skip_all)]
    pub async fn fetch_identity(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let request =
            HttpRequest::get(self.endpoint("me")).query(ACCESS_TOKEN_PARAM, access_token);
        let response =
            send_with_timeout(self.http.as_ref(), IDENTITY_PROBE, request, self.timeout).await?;

        if !response.is_success() {
            debug!(status = response.status, "Identity probe refused");
            return Err(ApiError::from_response(IDENTITY_PROBE, &response));
        }

        let profile: UserProfile = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::malformed(IDENTITY_PROBE, response.status, e))?;

        debug!(user_id = %profile.id, "Identity probe accepted token");
        Ok(profile)
    }

    /// Exchange `refresh_token` for a new access token.
    #[instrument(skip_all)]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshGrant, ApiError> {
        let request = HttpRequest::get(self.endpoint("refresh_token"))
            .query(REFRESH_TOKEN_PARAM, refresh_token);
        let response =
            send_with_timeout(self.http.as_ref(), TOKEN_REFRESH, request, self.timeout).await?;

        if !response.is_success() {
            warn!(status = response.status, "Token refresh refused");
            return Err(ApiError::from_response(TOKEN_REFRESH, &response));
        }

        let grant: RefreshGrant = serde_json::from_slice(&response.body)
            .map_err(|e| ApiError::malformed(TOKEN_REFRESH, response.status, e))?;

        if grant.access_token.is_empty() {
            return Err(ApiError::malformed(
                TOKEN_REFRESH,
                response.status,
                "empty access_token",
            ));
        }

        Ok(grant)
    }
}

impl std::fmt::Debug for AuthApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthApi")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
