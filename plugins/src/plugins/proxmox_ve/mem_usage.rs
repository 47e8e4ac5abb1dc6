//! Memory usage of Proxmox VE nodes and VMs

use serde::{Deserialize, Serialize};

use super::check_usage;
use crate::api::{CheckPlugin, CheckResult, Service, StringTable};
use crate::error::Result;
use crate::section::parse_json_section;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MemUsage {
    pub mem: f64,
    pub max_mem: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemUsageParams {
    /// Upper levels in percent
    pub levels: Option<(f64, f64)>,
}

impl Default for MemUsageParams {
    fn default() -> Self {
        Self {
            levels: Some((80.0, 90.0)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxmoxVeMemUsage;

impl CheckPlugin for ProxmoxVeMemUsage {
    type Section = MemUsage;
    type Params = MemUsageParams;

    fn name(&self) -> &'static str {
        "proxmox_ve_mem_usage"
    }

    fn service_name(&self) -> &'static str {
        "Proxmox VE Memory Usage"
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
        Ok(vec![check_usage(
            section.mem,
            section.max_mem,
            params.levels,
            "mem_used",
            "mem_used_percent",
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::State;

    #[test]
    fn test_mem_usage() {
        let section = ProxmoxVeMemUsage
            .parse(&vec![vec![r#"{"mem": 1073741824, "max_mem": 4294967296}"#.to_string()]])
            .unwrap();
        let results = ProxmoxVeMemUsage
            .check(None, &MemUsageParams::default(), &section)
            .unwrap();
        assert_eq!(results[0].state, State::Ok);
        assert_eq!(results[0].text, "Usage: 25.00% - 1.00 GiB of 4.00 GiB");
        assert_eq!(results[0].metrics[1].name, "mem_used_percent");
    }

    #[test]
    fn test_params_from_json() {
        let params: MemUsageParams = serde_json::from_str(r#"{"levels": [50.0, 60.0]}"#).unwrap();
        assert_eq!(params.levels, Some((50.0, 60.0)));
        let params: MemUsageParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, MemUsageParams::default());
    }
}
