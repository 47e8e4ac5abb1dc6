//! Proxmox VE special agent
//!
//! Collects cluster, node and VM data through the Proxmox VE REST API and
//! writes it as agent sections. Past backups are reconstructed from the logs
//! of `vzdump` tasks, see [`backup_log`].

pub mod agent;
pub mod args;
pub mod backup_log;
pub mod cache;
pub mod error;
pub mod output;
pub mod session;
pub mod tree;

pub use agent::{run, AgentContext};
pub use args::Args;
pub use backup_log::{BackupLogParser, BackupRecord, LogParseError, ParsedLog, Severity};
pub use error::{AgentError, Result};
pub use output::AgentWriter;
pub use session::ProxmoxVeSession;
pub use tree::{get_tree, ApiSource, Request};
