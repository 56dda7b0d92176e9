use core_auth::{ApiError, AuthError};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum InsightsError {
    #[error("Invalid playlist id: {0:?}")]
    InvalidPlaylistId(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl InsightsError {
    /// The backend error behind this failure, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            InsightsError::Auth(e) => e.api_error(),
            InsightsError::InvalidPlaylistId(_) => None,
        }
    }

    /// Whether the call failed because the session is no longer authorized.
    pub fn is_unauthorized(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_unauthorized)
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
