use std::path::PathBuf;

use thiserror::Error;

/// Errors of werk parsing, validation and the werk tool
#[derive(Error, Debug)]
pub enum WerkError {
    #[error("Cannot parse werk {file_name}: {reason}")]
    Parse { file_name: String, reason: String },

    #[error("Invalid werk field {field:?}: {reason}")]
    Invalid { field: String, reason: String },

    /// A werk file failed to load, carrying the file for triage
    #[error("{path}: {source}\n\n{content}")]
    InFile {
        path: PathBuf,
        content: String,
        #[source]
        source: Box<WerkError>,
    },

    #[error("Can not find Werk with id={0}")]
    NotFound(u32),

    #[error("No last Werk known. Please specify id.")]
    NoLastWerk,

    #[error("Cannot find directory .werks")]
    NoWerksDir,

    #[error("Werk IDs: {0}")]
    Ids(String),

    #[error("git {command} failed: {message}")]
    Git { command: String, message: String },

    #[error("Cherry-picking {commit} failed with exit code {code}")]
    PickFailed { commit: String, code: i32 },

    #[error("{0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WerkError {
    pub fn parse(file_name: &str, reason: impl Into<String>) -> Self {
        WerkError::Parse {
            file_name: file_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        WerkError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            WerkError::PickFailed { code, .. } => *code,
            _ => 1,
        }
    }

    /// Attach the offending file to a parse or validation error
    pub fn in_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        match self {
            WerkError::Parse { .. } | WerkError::Invalid { .. } => WerkError::InFile {
                path: path.into(),
                content: content.into(),
                source: Box::new(self),
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, WerkError>;
