//! AWS load balancer summary (`aws_elb_summary`)
//!
//! The section is a JSON list of load balancer descriptions. Classic load
//! balancers list their availability zones as plain strings, application
//! and network load balancers as `{"ZoneName": ...}` objects. Load
//! balancers that do not parse are skipped, zones of unknown shape are
//! shown as their raw JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::regions::{region_name, split_availability_zone};
use crate::api::{CheckPlugin, CheckResult, Service, StringTable};
use crate::error::{PluginError, Result};
use crate::section::parse_json_rows;

/// An availability zone as a name, a zone description or anything else
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AvailabilityZone {
    Name(String),
    Described {
        #[serde(rename = "ZoneName")]
        zone_name: String,
    },
    Unknown(Value),
}

impl AvailabilityZone {
    pub fn zone_name(&self) -> Option<&str> {
        match self {
            AvailabilityZone::Name(name) => Some(name.as_str()),
            AvailabilityZone::Described { zone_name } => Some(zone_name.as_str()),
            AvailabilityZone::Unknown(_) => None,
        }
    }

    /// `Europe (Frankfurt) (a)` for `eu-central-1a`
    pub fn render(&self) -> String {
        let zone = match self {
            AvailabilityZone::Name(zone) | AvailabilityZone::Described { zone_name: zone } => zone,
            AvailabilityZone::Unknown(raw) => return raw.to_string(),
        };
        match split_availability_zone(zone) {
            Some((region, letter)) => format!("{} ({})", region_name(region), letter),
            None => zone.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoadBalancer {
    #[serde(rename = "LoadBalancerName")]
    pub name: String,
    #[serde(rename = "DNSName", default)]
    pub dns_name: Option<String>,
    #[serde(rename = "Region", default)]
    pub region: Option<String>,
    #[serde(rename = "AvailabilityZones", default)]
    pub availability_zones: Vec<AvailabilityZone>,
}

impl LoadBalancer {
    /// Explicit region, else the region of the first availability zone
    pub fn region(&self) -> Option<String> {
        if let Some(region) = &self.region {
            return Some(region.clone());
        }
        self.availability_zones
            .iter()
            .find_map(AvailabilityZone::zone_name)
            .and_then(split_availability_zone)
            .map(|(region, _)| region.to_string())
    }
}

/// Load balancers grouped by region code
pub type ElbSummarySection = BTreeMap<String, Vec<LoadBalancer>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElbSummaryParams {}

#[derive(Debug, Clone, Copy, Default)]
pub struct AwsElbSummary;

impl CheckPlugin for AwsElbSummary {
    type Section = ElbSummarySection;
    type Params = ElbSummaryParams;

    fn name(&self) -> &'static str {
        "aws_elb_summary"
    }

    fn service_name(&self) -> &'static str {
        "AWS/ELB Summary %s"
    }

    fn parse(&self, string_table: &StringTable) -> Result<Self::Section> {
        let mut section = ElbSummarySection::new();
        for value in parse_json_rows(string_table) {
            let balancer: LoadBalancer = match serde_json::from_value(value) {
                Ok(balancer) => balancer,
                Err(e) => {
                    warn!("{}: skipping malformed load balancer: {}", self.name(), e);
                    continue;
                }
            };
            let region = balancer.region().unwrap_or_default();
            section.entry(region).or_default().push(balancer);
        }
        Ok(section)
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service> {
        section.keys().map(Service::with_item).collect()
    }

    fn check(
        &self,
        item: Option<&str>,
        _params: &Self::Params,
        section: &Self::Section,
    ) -> Result<Vec<CheckResult>> {
        let balancers = item
            .and_then(|region| section.get(region))
            .ok_or(PluginError::ItemNotFound)?;

        let mut results = vec![CheckResult::ok(format!("Balancers: {}", balancers.len()))];
        for balancer in balancers {
            let zones = balancer
                .availability_zones
                .iter()
                .map(AvailabilityZone::render)
                .collect::<Vec<_>>()
                .join(", ");
            results.push(CheckResult::ok(format!("\n{}: {}", balancer.name, zones)));
        }
        Ok(results)
    }
}
