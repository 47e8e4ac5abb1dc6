use thiserror::Error;

use crate::backup_log::LogParseError;

/// Errors of the Proxmox VE special agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// The agent cannot produce meaningful output. Reported once on stderr.
    #[error("{0}")]
    CannotRecover(String),

    /// The API answered with data that does not fit the requested tree
    #[error("Unexpected API response at {path:?}: {reason}")]
    UnexpectedShape { path: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A backup log could not be parsed in strict mode
    #[error("Backup log: {0}")]
    LogParse(#[from] LogParseError),
}

impl AgentError {
    pub fn unexpected_shape(path: &str, reason: impl Into<String>) -> Self {
        AgentError::UnexpectedShape {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
