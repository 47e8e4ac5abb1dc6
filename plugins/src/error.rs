//! Error handling for check plugins
//!
//! Check functions do not fail for ordinary "no data yet" conditions. The
//! variants here cover broken agent output, unusable parameters, and the two
//! conditions the host runtime treats specially: a vanished item and the
//! "results currently unavailable" signal.

use thiserror::Error;

/// The main error type for parse, discovery and check functions
#[derive(Error, Debug)]
pub enum PluginError {
    /// Agent output could not be turned into a section
    #[error("Parse error in section {section}: {reason}")]
    Parse { section: String, reason: String },

    /// A JSON blob inside a section was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The item is no longer present in the section
    #[error("Item not found in monitoring data")]
    ItemNotFound,

    /// The data needed for a result is not available right now. The host
    /// keeps the last known state instead of going UNKNOWN.
    #[error("Results currently unavailable: {0}")]
    IgnoreResults(String),

    /// Configured parameters do not match the plugin's parameter schema
    #[error("Invalid parameters for {plugin}: {reason}")]
    InvalidParams { plugin: String, reason: String },

    /// No plugin is registered under this name
    #[error("Unknown check plugin: {0}")]
    UnknownPlugin(String),
}

impl PluginError {
    pub fn parse(section: &str, reason: impl Into<String>) -> Self {
        PluginError::Parse {
            section: section.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PluginError>;
