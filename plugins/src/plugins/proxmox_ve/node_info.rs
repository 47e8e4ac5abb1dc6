//! Proxmox VE node status, subscription and version

use serde::{Deserialize, Serialize};

use crate::api::{CheckPlugin, CheckResult, HostLabel, Service, State, StringTable};
use crate::error::Result;
use crate::section::parse_json_section;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub productname: Option<String>,
    #[serde(default)]
    pub nextduedate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodeVersion {
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeInfo {
    pub status: String,
    #[serde(default)]
    pub lxc: Vec<String>,
    #[serde(default)]
    pub qemu: Vec<String>,
    #[serde(default)]
    pub proxmox_ve_version: NodeVersion,
    #[serde(default)]
    pub subscription: Subscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfoParams {
    pub required_node_status: String,
    pub required_subscription_status: String,
    /// Accept a node without any subscription
    pub tolerate_missing_subscription: bool,
}

impl Default for NodeInfoParams {
    fn default() -> Self {
        Self {
            required_node_status: "online".to_string(),
            required_subscription_status: "active".to_string(),
            tolerate_missing_subscription: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProxmoxVeNodeInfo;

impl CheckPlugin for ProxmoxVeNodeInfo {
    type Section = NodeInfo;
    type Params = NodeInfoParams;

    fn name(&self) -> &'static str {
        "proxmox_ve_node_info"
    }

    fn service_name(&self) -> &'static str {
        "Proxmox VE Node Info"
    }

    fn parse(&self, string_table: &StringTable) -> Result<Self::Section> {
        let value = parse_json_section(string_table, self.name())?;
        Ok(serde_json::from_value(value)?)
    }

    fn host_labels(&self, _section: &Self::Section) -> Vec<HostLabel> {
        vec![HostLabel::new("cmk/pve/entity", "node")]
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
        let node_status = section.status.to_lowercase();
        let node_state = if node_status == params.required_node_status.to_lowercase() {
            State::Ok
        } else {
            State::Crit
        };

        let subscription_status = section.subscription.status.to_lowercase();
        let subscription_state = if subscription_status
            == params.required_subscription_status.to_lowercase()
            || (params.tolerate_missing_subscription && subscription_status == "notfound")
        {
            State::Ok
        } else {
            State::Crit
        };

        Ok(vec![
            CheckResult::new(node_state, format!("Status: {}", node_status)),
            CheckResult::new(
                subscription_state,
                format!("Subscription: {}", subscription_status),
            ),
            CheckResult::ok(format!("Version: {}", section.proxmox_ve_version.release)),
            CheckResult::ok(format!(
                "Hosted VMs: {} LXCs, {} Qemu VMs",
                section.lxc.len(),
                section.qemu.len()
            )),
        ])
    }
}
