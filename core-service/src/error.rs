use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Insights error: {0}")]
    Insights(#[from] core_insights::InsightsError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
