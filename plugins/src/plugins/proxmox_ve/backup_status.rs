//! Last backup of a Proxmox VE VM
//!
//! The special agent reports the most recent backup found in the vzdump
//! task logs. Depending on the storage backend a record carries different
//! transfer figures, the bandwidth is derived from whichever set is present.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::Clock;
use crate::api::{CheckPlugin, CheckResult, Metric, Service, State, StringTable};
use crate::error::{PluginError, Result};
use crate::levels::check_levels;
use crate::render;
use crate::section::parse_json_section;

/// A finalized backup record as written by the special agent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LastBackup {
    pub started_time: Option<String>,
    pub total_duration: Option<f64>,
    pub bytes_written_size: Option<f64>,
    pub bytes_written_bandwidth: Option<f64>,
    pub transfer_size: Option<f64>,
    pub transfer_time: Option<f64>,
    pub upload_amount: Option<f64>,
    pub upload_total: Option<f64>,
    pub upload_time: Option<f64>,
    pub backup_amount: Option<f64>,
    pub backup_total: Option<f64>,
    pub backup_time: Option<f64>,
    pub archive_name: Option<String>,
    pub archive_size: Option<f64>,
    pub error: Option<String>,
}

impl LastBackup {
    /// Bytes per second from the first complete set of transfer figures
    pub fn bandwidth(&self) -> Option<f64> {
        if let Some(bandwidth) = self.bytes_written_bandwidth {
            return Some(bandwidth);
        }
        let pairs = [
            (self.transfer_size, self.transfer_time),
            (self.upload_amount, self.upload_time),
            (self.backup_amount, self.backup_time),
            (self.bytes_written_size, self.total_duration),
        ];
        pairs.into_iter().find_map(|pair| match pair {
            (Some(size), Some(time)) if time > 0.0 => Some(size / time),
            _ => None,
        })
    }

    /// Ratio of total data to data actually transferred
    pub fn dedup_rate(&self) -> Option<f64> {
        match (self.backup_amount, self.backup_total) {
            (Some(amount), Some(total)) if amount > 0.0 => Some(total / amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BackupStatus {
    pub last_backup: Option<LastBackup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupStatusParams {
    /// Upper levels for the backup age in seconds
    pub age_levels_upper: Option<(f64, f64)>,
    /// State reported when no backup was found
    pub no_backup_state: State,
}

impl Default for BackupStatusParams {
    fn default() -> Self {
        Self {
            age_levels_upper: Some((26.0 * 3600.0, 50.0 * 3600.0)),
            no_backup_state: State::Crit,
        }
    }
}

/// Parse `%Y-%m-%d %H:%M:%S%z`, falling back to a naive UTC timestamp
pub fn parse_started_time(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(time) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%z") {
        return Some(time);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| FixedOffset::east_opt(0).map(|utc| utc.from_utc_datetime(&naive)))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxmoxVeVmBackupStatus {
    clock: Clock,
}

impl ProxmoxVeVmBackupStatus {
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl CheckPlugin for ProxmoxVeVmBackupStatus {
    type Section = BackupStatus;
    type Params = BackupStatusParams;

    fn name(&self) -> &'static str {
        "proxmox_ve_vm_backup_status"
    }

    fn service_name(&self) -> &'static str {
        "Proxmox VE VM Backup Status"
    }

    fn parse(&self, string_table: &StringTable) -> Result<Self::Section> {
        let value = parse_json_section(string_table, self.name())?;
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
        let Some(backup) = &section.last_backup else {
            return Ok(vec![CheckResult::new(
                params.no_backup_state,
                "No backup found",
            )]);
        };

        if let Some(error) = &backup.error {
            return Ok(vec![CheckResult::new(
                State::Crit,
                format!("Backup failed: {}", error),
            )]);
        }

        let started_text = backup
            .started_time
            .as_deref()
            .ok_or_else(|| PluginError::parse(self.name(), "backup without start time"))?;
        let started = parse_started_time(started_text).ok_or_else(|| {
            PluginError::parse(self.name(), format!("invalid start time {:?}", started_text))
        })?;

        let mut results = Vec::new();

        let age = (self.clock.now() - started.with_timezone(&Utc)).num_seconds() as f64;
        let (state, text) = check_levels(age, params.age_levels_upper, render::timespan, "Age");
        results.push(
            CheckResult::new(state, text)
                .with_metric(Metric::new("age", age).with_levels(params.age_levels_upper)),
        );

        results.push(CheckResult::ok(format!(
            "Server local start time: {}",
            started.format("%Y-%m-%d %H:%M:%S")
        )));

        if let Some(duration) = backup.total_duration {
            results.push(
                CheckResult::ok(format!("Duration: {}", render::timespan(duration)))
                    .with_metric(Metric::new("backup_duration", duration)),
            );
        }

        if let Some(bandwidth) = backup.bandwidth() {
            results.push(
                CheckResult::ok(format!("Bandwidth: {}", render::iobandwidth(bandwidth)))
                    .with_metric(Metric::new("backup_avgspeed", bandwidth)),
            );
        }

        if let Some(rate) = backup.dedup_rate() {
            results.push(CheckResult::ok(format!("Dedup rate: {:.2}", rate)));
        }

        Ok(results)
    }
}
