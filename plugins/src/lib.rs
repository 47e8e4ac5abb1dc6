//! Check plugins library
//!
//! This library turns raw agent output into monitoring results. It provides
//! the plugin contract, the agent section protocol, rendering helpers, the
//! generic usage-against-limit checker and the AWS and Proxmox VE check
//! plugins built on top of them.

pub mod api;
pub mod error;
pub mod levels;
pub mod limits;
pub mod plugins;
pub mod registry;
pub mod render;
pub mod section;

// Re-export commonly used types
pub use api::{CheckPlugin, CheckResult, HostLabel, Metric, Service, State, StringTable};
pub use error::{PluginError, Result};
pub use levels::check_levels;
pub use limits::{check_limits, LimitLevels, LimitRow};
pub use registry::Registry;
pub use section::{parse_agent_output, parse_json_rows, parse_json_section, AgentOutput};
