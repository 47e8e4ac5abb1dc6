//! Plugin registry and service execution
//!
//! Plugins have differently typed sections and parameters. The registry
//! stores them behind [`DynPlugin`], which works on raw string tables and
//! JSON parameters, and runs discovery and checks over parsed agent output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{format_service_name, CheckPlugin, CheckResult, HostLabel, Metric, Service, State, StringTable};
use crate::error::{PluginError, Result};
use crate::plugins::{aws, proxmox_ve};
use crate::section::AgentOutput;

/// Type-erased view of a [`CheckPlugin`]
pub trait DynPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn section_name(&self) -> &'static str;
    fn service_description(&self, item: Option<&str>) -> String;
    fn default_params(&self) -> Result<Value>;
    fn discover_table(&self, string_table: &StringTable) -> Result<(Vec<Service>, Vec<HostLabel>)>;
    fn check_table(
        &self,
        item: Option<&str>,
        params: &Value,
        string_table: &StringTable,
    ) -> Result<Vec<CheckResult>>;
}

impl<P: CheckPlugin> DynPlugin for P {
    fn name(&self) -> &'static str {
        CheckPlugin::name(self)
    }

    fn section_name(&self) -> &'static str {
        CheckPlugin::section_name(self)
    }

    fn service_description(&self, item: Option<&str>) -> String {
        format_service_name(self.service_name(), item)
    }

    fn default_params(&self) -> Result<Value> {
        Ok(serde_json::to_value(P::Params::default())?)
    }

    fn discover_table(&self, string_table: &StringTable) -> Result<(Vec<Service>, Vec<HostLabel>)> {
        let section = self.parse(string_table)?;
        Ok((self.discover(&section), self.host_labels(&section)))
    }

    fn check_table(
        &self,
        item: Option<&str>,
        params: &Value,
        string_table: &StringTable,
    ) -> Result<Vec<CheckResult>> {
        let merged = merge_params(self.default_params()?, params);
        let params: P::Params =
            serde_json::from_value(merged).map_err(|e| PluginError::InvalidParams {
                plugin: CheckPlugin::name(self).to_string(),
                reason: e.to_string(),
            })?;
        let section = self.parse(string_table)?;
        self.check(item, &params, &section)
    }
}

/// Overlay configured parameters on the defaults, key by key
fn merge_params(defaults: Value, configured: &Value) -> Value {
    match (defaults, configured) {
        (Value::Object(mut merged), Value::Object(configured)) => {
            for (key, value) in configured {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (defaults, Value::Null) => defaults,
        (_, configured) => configured.clone(),
    }
}

/// A service found on a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredService {
    /// Piggyback host, `None` for the queried host
    pub host: Option<String>,
    pub plugin: String,
    pub item: Option<String>,
    pub description: String,
    pub parameters: Value,
}

/// Outcome of checking one service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub service: DiscoveredService,
    pub state: State,
    pub summary: String,
    pub details: Vec<String>,
    pub metrics: Vec<Metric>,
    /// Results were withheld, the previous state stays in place
    pub pending: bool,
}

impl ServiceReport {
    fn from_results(service: DiscoveredService, results: Vec<CheckResult>) -> Self {
        let state = State::worst_of(results.iter().map(|r| r.state));
        let mut summary = Vec::new();
        let mut details = Vec::new();
        let mut metrics = Vec::new();
        for result in results {
            metrics.extend(result.metrics);
            match result.text.strip_prefix('\n') {
                Some(detail) => details.push(detail.to_string()),
                None => summary.push(result.text),
            }
        }
        Self {
            service,
            state,
            summary: summary.join(", "),
            details,
            metrics,
            pending: false,
        }
    }

    fn from_error(service: DiscoveredService, error: PluginError) -> Self {
        let (state, pending) = match &error {
            PluginError::IgnoreResults(_) => (State::Ok, true),
            _ => (State::Unknown, false),
        };
        Self {
            service,
            state,
            summary: error.to_string(),
            details: Vec::new(),
            metrics: Vec::new(),
            pending,
        }
    }
}

/// All known check plugins, keyed by plugin name
#[derive(Default)]
pub struct Registry {
    plugins: BTreeMap<&'static str, Box<dyn DynPlugin>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every plugin shipped in this crate
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(aws::AWS_EC2_LIMITS);
        registry.register(aws::AWS_EBS_LIMITS);
        registry.register(aws::AWS_ELB_LIMITS);
        registry.register(aws::AWS_S3_LIMITS);
        registry.register(aws::AWS_GLACIER_LIMITS);
        registry.register(aws::AwsElbSummary);
        registry.register(proxmox_ve::ProxmoxVeNodeInfo);
        registry.register(proxmox_ve::ProxmoxVeMemUsage);
        registry.register(proxmox_ve::ProxmoxVeDiskUsage);
        registry.register(proxmox_ve::ProxmoxVeVmBackupStatus::default());
        registry.register(proxmox_ve::ProxmoxVeVmSnapshotAge::default());
        registry
    }

    pub fn register<P: CheckPlugin + 'static>(&mut self, plugin: P) {
        let name = CheckPlugin::name(&plugin);
        if self.plugins.insert(name, Box::new(plugin)).is_some() {
            warn!("Check plugin {} registered twice, keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Result<&dyn DynPlugin> {
        self.plugins
            .get(name)
            .map(|plugin| plugin.as_ref())
            .ok_or_else(|| PluginError::UnknownPlugin(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.keys().copied()
    }

    /// Discover services and host labels on every host of the agent output
    ///
    /// Sections that fail to parse are logged and skipped.
    pub fn discover(&self, output: &AgentOutput) -> (Vec<DiscoveredService>, Vec<(Option<String>, HostLabel)>) {
        let mut services = Vec::new();
        let mut labels = Vec::new();
        for host in output.hosts() {
            for plugin in self.plugins.values() {
                let Some(table) = output.section(host, plugin.section_name()) else {
                    continue;
                };
                match plugin.discover_table(table) {
                    Ok((found, host_labels)) => {
                        services.extend(found.into_iter().map(|service| DiscoveredService {
                            host: host.map(str::to_string),
                            plugin: plugin.name().to_string(),
                            description: plugin.service_description(service.item.as_deref()),
                            item: service.item,
                            parameters: service.parameters,
                        }));
                        labels.extend(
                            host_labels
                                .into_iter()
                                .map(|label| (host.map(str::to_string), label)),
                        );
                    }
                    Err(e) => warn!(
                        "Discovery of {} failed on host {}: {}",
                        plugin.name(),
                        host.unwrap_or("<local>"),
                        e
                    ),
                }
            }
        }
        (services, labels)
    }

    /// Check one discovered service, configured parameters are looked up by
    /// plugin name
    pub fn check_service(
        &self,
        output: &AgentOutput,
        service: &DiscoveredService,
        params: &BTreeMap<String, Value>,
    ) -> ServiceReport {
        let plugin = match self.get(&service.plugin) {
            Ok(plugin) => plugin,
            Err(e) => return ServiceReport::from_error(service.clone(), e),
        };
        let configured = params.get(&service.plugin).cloned().unwrap_or(Value::Null);
        let configured = merge_params(service.parameters.clone(), &configured);

        let Some(table) = output.section(service.host.as_deref(), plugin.section_name()) else {
            return ServiceReport::from_error(service.clone(), PluginError::ItemNotFound);
        };
        debug!("Checking {} ({})", service.description, service.plugin);
        match plugin.check_table(service.item.as_deref(), &configured, table) {
            Ok(results) => ServiceReport::from_results(service.clone(), results),
            Err(e) => ServiceReport::from_error(service.clone(), e),
        }
    }

    /// Discover and check every service of the agent output
    pub fn check_all(&self, output: &AgentOutput, params: &BTreeMap<String, Value>) -> Vec<ServiceReport> {
        let (services, _) = self.discover(output);
        services
            .iter()
            .map(|service| self.check_service(output, service, params))
            .collect()
    }
}
