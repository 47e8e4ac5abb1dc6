//! Disk usage of Proxmox VE containers

use serde::{Deserialize, Serialize};

use super::check_usage;
use crate::api::{CheckPlugin, CheckResult, Metric, Service, StringTable};
use crate::error::Result;
use crate::section::parse_json_section;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DiskUsage {
    pub disk: f64,
    pub max_disk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskUsageParams {
    pub levels: Option<(f64, f64)>,
}

impl Default for DiskUsageParams {
    fn default() -> Self {
        Self {
            levels: Some((80.0, 90.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxmoxVeDiskUsage;

impl CheckPlugin for ProxmoxVeDiskUsage {
    type Section = DiskUsage;
    type Params = DiskUsageParams;

    fn name(&self) -> &'static str {
        "proxmox_ve_disk_usage"
    }

    fn service_name(&self) -> &'static str {
        "Proxmox VE Disk Usage"
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
        let result = check_usage(
            section.disk,
            section.max_disk,
            params.levels,
            "fs_used",
            "fs_used_percent",
        )
        .with_metric(Metric::new("fs_size", section.max_disk));
        Ok(vec![result])
    }
}
