use bridge_traits::{BridgeError, HttpResponse};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// 401 or 403: the credential was refused.
    Unauthorized,
    /// Any other 4xx: the request itself was refused.
    Rejected,
    /// Network failure, timeout, 429 or 5xx. Retrying later may succeed.
    Transient,
    /// A success status with a body that could not be decoded.
    Malformed,
}

impl ErrorKind {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::Unauthorized,
            429 => ErrorKind::Transient,
            500..=599 => ErrorKind::Transient,
            _ => ErrorKind::Rejected,
        }
    }
}

/// Tagged error for a failed backend call.
///
/// Carries the HTTP status and decoded body (when there was a response) so
/// callers never need to inspect raw transport errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Short name of the call, e.g. `"identity probe"`
    pub operation: &'static str,
    pub kind: ErrorKind,
    pub status: Option<u16>,
    /// Response body, as JSON when it parsed, otherwise as a JSON string
    pub payload: Option<serde_json::Value>,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} failed with status {} ({:?}): {}",
                self.operation, status, self.kind, self.message
            ),
            None => write!(
                f,
                "{} failed ({:?}): {}",
                self.operation, self.kind, self.message
            ),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Build an error from a non-success response.
    pub fn from_response(operation: &'static str, response: &HttpResponse) -> Self {
        let payload = if response.body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice(&response.body).unwrap_or_else(|_| {
                    serde_json::Value::String(String::from_utf8_lossy(&response.body).into_owned())
                }),
            )
        };

        Self {
            operation,
            kind: ErrorKind::from_status(response.status),
            status: Some(response.status),
            payload,
            message: format!("backend returned {}", response.status),
        }
    }

    /// Build an error for a failure below HTTP (connect, TLS, I/O).
    pub fn transport(operation: &'static str, error: &BridgeError) -> Self {
        Self {
            operation,
            kind: ErrorKind::Transient,
            status: None,
            payload: None,
            message: error.to_string(),
        }
    }

    /// Build an error for a call that exceeded its deadline.
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self {
            operation,
            kind: ErrorKind::Transient,
            status: None,
            payload: None,
            message: format!("timed out after {:?}", after),
        }
    }

    /// Build an error for a success response whose body did not decode.
    pub fn malformed(operation: &'static str, status: u16, reason: impl fmt::Display) -> Self {
        Self {
            operation,
            kind: ErrorKind::Malformed,
            status: Some(status),
            payload: None,
            message: format!("undecodable response: {}", reason),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::Transient | ErrorKind::Malformed)
    }
}

#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("No access token available")]
    AuthMissing,

    #[error("Credentials rejected: {0}")]
    AuthInvalid(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Refresh token rejected: {0}")]
    RefreshRejected(ApiError),

    #[error("Token refresh failed transiently: {0}")]
    RefreshTransient(ApiError),

    #[error("Identity probe failed transiently: {0}")]
    ProbeTransient(ApiError),

    #[error(transparent)]
    Api(ApiError),

    #[error("Result discarded: session changed while the operation was in flight")]
    Superseded,

    #[error("Token storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Whether this outcome ends the session (credentials are cleared).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::AuthInvalid(_) | AuthError::NoRefreshToken | AuthError::RefreshRejected(_)
        )
    }

    /// The underlying backend error, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            AuthError::RefreshRejected(e)
            | AuthError::RefreshTransient(e)
            | AuthError::ProbeTransient(e)
            | AuthError::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BridgeError> for AuthError {
    fn from(error: BridgeError) -> Self {
        AuthError::Storage(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
