//! Proxmox VE check plugins
//!
//! All sections are written by the Proxmox VE special agent as a single
//! JSON document per `sep(0)` section.

pub mod backup_status;
pub mod disk_usage;
pub mod mem_usage;
pub mod node_info;
pub mod snapshot_age;

pub use backup_status::ProxmoxVeVmBackupStatus;
pub use disk_usage::ProxmoxVeDiskUsage;
pub use mem_usage::ProxmoxVeMemUsage;
pub use node_info::ProxmoxVeNodeInfo;
pub use snapshot_age::ProxmoxVeVmSnapshotAge;

use chrono::{DateTime, Utc};

use crate::api::{CheckResult, Metric, State};
use crate::limits::classify;
use crate::render;

/// Reference time for age computations, fixed in tests
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    fixed: Option<DateTime<Utc>>,
}

impl Clock {
    pub fn fixed(now: DateTime<Utc>) -> Self {
        Self { fixed: Some(now) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.fixed.unwrap_or_else(Utc::now)
    }
}

/// `Usage: <pct> - <used> of <max>` against percentage levels
pub(crate) fn check_usage(
    used: f64,
    max: f64,
    levels: Option<(f64, f64)>,
    used_metric: &str,
    percent_metric: &str,
) -> CheckResult {
    let percent = if max > 0.0 { 100.0 * used / max } else { 0.0 };
    let state = classify(percent, levels);
    let mut text = format!(
        "Usage: {} - {} of {}",
        render::percent(percent),
        render::bytes(used),
        render::bytes(max)
    );
    match (state, levels) {
        (State::Ok, _) | (_, None) => {}
        (_, Some((warn, crit))) => text.push_str(&format!(
            " (warn/crit at {}/{})",
            render::percent(warn),
            render::percent(crit)
        )),
    }
    CheckResult::new(state, text).with_metrics([
        Metric::new(used_metric, used).with_boundaries(Some(0.0), Some(max)),
        Metric::new(percent_metric, percent)
            .with_levels(levels)
            .with_boundaries(Some(0.0), Some(100.0)),
    ])
}
