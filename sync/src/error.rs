use thiserror::Error;

/// Errors of pushing a profile to one remote site
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid site URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Empty output from remote site.")]
    EmptyResponse,

    /// The remote site answered, but not with a success
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
