//! Age of the oldest snapshot of a Proxmox VE VM

use serde::{Deserialize, Serialize};

use super::Clock;
use crate::api::{CheckPlugin, CheckResult, Metric, Service, State, StringTable};
use crate::error::Result;
use crate::levels::check_levels;
use crate::render;
use crate::section::parse_json_section;

/// Creation times of all snapshots, seconds since the epoch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SnapshotAge {
    #[serde(default)]
    pub snaptimes: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotAgeParams {
    /// Upper levels for the age of the oldest snapshot in seconds
    pub oldest_levels: Option<(f64, f64)>,
}

impl Default for SnapshotAgeParams {
    fn default() -> Self {
        Self {
            oldest_levels: Some((7.0 * 86_400.0, 30.0 * 86_400.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxmoxVeVmSnapshotAge {
    clock: Clock,
}

impl ProxmoxVeVmSnapshotAge {
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl CheckPlugin for ProxmoxVeVmSnapshotAge {
    type Section = SnapshotAge;
    type Params = SnapshotAgeParams;

    fn name(&self) -> &'static str {
        "proxmox_ve_vm_snapshot_age"
    }

    fn service_name(&self) -> &'static str {
        "Proxmox VE VM Snapshot age"
    }

    /// A VM unknown to the snapshot listing is written as `null`
    fn parse(&self, string_table: &StringTable) -> Result<Self::Section> {
        let value = parse_json_section(string_table, self.name())?;
        if value.is_null() {
            return Ok(SnapshotAge::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    fn discover(&self, _section: &Self::Section) -> Vec<Service> {
        vec![Service::single()]
    }

    fn check(
        &self,
        _item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
    ) -> Result<Vec<CheckResult>> {
        let Some(oldest) = section.snaptimes.iter().min() else {
            return Ok(vec![CheckResult::ok("No snapshot found")]);
        };

        let age = (self.clock.now().timestamp() - oldest) as f64;
        let (state, text) = check_levels(age, params.oldest_levels, render::timespan, "Age");
        Ok(vec![
            CheckResult::new(state, text)
                .with_metric(Metric::new("age", age).with_levels(params.oldest_levels)),
            CheckResult::new(
                State::Ok,
                format!("Number of snapshots: {}", section.snaptimes.len()),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn plugin() -> ProxmoxVeVmSnapshotAge {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        ProxmoxVeVmSnapshotAge::with_clock(Clock::fixed(now))
    }

    #[test]
    fn test_no_snapshots() {
        let section = plugin().parse(&vec![vec!["null".to_string()]]).unwrap();
        let results = plugin()
            .check(None, &SnapshotAgeParams::default(), &section)
            .unwrap();
        assert_eq!(results, vec![CheckResult::ok("No snapshot found")]);
    }

    #[test]
    fn test_oldest_snapshot_counts() {
        let section = SnapshotAge {
            snaptimes: vec![1_700_000_000 - 3_600, 1_700_000_000 - 8 * 86_400],
        };
        let results = plugin()
            .check(None, &SnapshotAgeParams::default(), &section)
            .unwrap();
        assert_eq!(results[0].state, State::Warn);
        assert_eq!(results[0].text, "Age: 8 days (warn/crit at 7 days/30 days)");
        assert_eq!(results[1].text, "Number of snapshots: 2");
    }
}
