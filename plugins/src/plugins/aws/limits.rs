//! AWS quota sections (`aws_*_limits`)
//!
//! The AWS agent writes one JSON list per section with rows of
//! `[key, title, limit, amount, region]`. Each region becomes one service
//! evaluated by the generic limit checker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::{CheckPlugin, CheckResult, Service, StringTable};
use crate::error::{PluginError, Result};
use crate::limits::{check_limits, LimitLevels, LimitParams, LimitRow};
use crate::render;
use crate::section::parse_json_rows;

const TIB: f64 = 1024.0 * 1024.0 * 1024.0 * 1024.0;

/// One quota row of a region
#[derive(Debug, Clone, PartialEq)]
pub struct AwsLimit {
    pub key: String,
    pub title: String,
    pub limit: Option<f64>,
    pub amount: f64,
}

/// Quota rows grouped by region code
pub type AwsLimitsSection = BTreeMap<String, Vec<AwsLimit>>;

/// Configured levels, merged over the plugin's default table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AwsLimitsParams(pub LimitParams);

/// Keys reported in TiB by the agent
fn is_storage_key(key: &str) -> bool {
    key.starts_with("block_store_space_")
}

/// Render function for a quota key
pub fn render_for(key: &str) -> fn(f64) -> String {
    if is_storage_key(key) {
        render::bytes
    } else {
        render::count
    }
}

type LimitRecord = (String, String, Option<f64>, f64, String);

/// Parse a JSON limits section shared by all `aws_*_limits` sections.
/// Rows that do not have the expected shape are skipped.
pub fn parse_aws_limits_generic(string_table: &StringTable, section: &str) -> Result<AwsLimitsSection> {
    let mut parsed = AwsLimitsSection::new();
    for value in parse_json_rows(string_table) {
        let (key, title, limit, amount, region) =
            match serde_json::from_value::<LimitRecord>(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!("{}: skipping malformed limit row: {}", section, e);
                    continue;
                }
            };
        let (limit, amount) = if is_storage_key(&key) {
            (limit.map(|l| l * TIB), amount * TIB)
        } else {
            (limit, amount)
        };
        parsed.entry(region).or_default().push(AwsLimit {
            key,
            title,
            limit,
            amount,
        });
    }
    Ok(parsed)
}

/// A limits plugin for one AWS service
#[derive(Debug, Clone, Copy)]
pub struct AwsLimitsPlugin {
    name: &'static str,
    service: &'static str,
    service_name: &'static str,
    /// Keys with default levels
    keys: &'static [&'static str],
    /// Key prefixes of per-type resources that also get default levels
    dynamic_prefixes: &'static [&'static str],
}

impl AwsLimitsPlugin {
    /// Default levels for every known key
    pub fn default_levels(&self) -> LimitParams {
        self.keys
            .iter()
            .map(|key| (key.to_string(), LimitLevels::percent(80.0, 90.0)))
            .collect()
    }

    fn effective_levels(&self, params: &AwsLimitsParams, rows: &[AwsLimit]) -> LimitParams {
        let mut levels = self.default_levels();
        for row in rows {
            if self
                .dynamic_prefixes
                .iter()
                .any(|prefix| row.key.starts_with(prefix))
            {
                levels
                    .entry(row.key.clone())
                    .or_insert_with(|| LimitLevels::percent(80.0, 90.0));
            }
        }
        levels.extend(params.0.iter().map(|(k, v)| (k.clone(), *v)));
        levels
    }
}

impl CheckPlugin for AwsLimitsPlugin {
    type Section = AwsLimitsSection;
    type Params = AwsLimitsParams;

    fn name(&self) -> &'static str {
        self.name
    }

    fn service_name(&self) -> &'static str {
        self.service_name
    }

    fn parse(&self, string_table: &StringTable) -> Result<Self::Section> {
        parse_aws_limits_generic(string_table, self.name)
    }

    fn discover(&self, section: &Self::Section) -> Vec<Service> {
        section.keys().map(Service::with_item).collect()
    }

    fn check(
        &self,
        item: Option<&str>,
        params: &Self::Params,
        section: &Self::Section,
    ) -> Result<Vec<CheckResult>> {
        let rows = item
            .and_then(|region| section.get(region))
            .ok_or(PluginError::ItemNotFound)?;
        let levels = self.effective_levels(params, rows);
        let limit_rows: Vec<LimitRow> = rows
            .iter()
            .map(|row| {
                LimitRow::new(
                    row.key.clone(),
                    row.title.clone(),
                    row.limit,
                    row.amount,
                    render_for(&row.key),
                )
            })
            .collect();
        Ok(check_limits(self.service, &levels, &limit_rows))
    }
}

pub const AWS_EC2_LIMITS: AwsLimitsPlugin = AwsLimitsPlugin {
    name: "aws_ec2_limits",
    service: "ec2",
    service_name: "AWS/EC2 Limits %s",
    keys: &[
        "running_ondemand_instances_total",
        "vpc_elastic_ip_addresses",
        "elastic_ip_addresses",
        "vpc_sec_groups",
        "vpc_sec_group_rules",
        "if_vpc_sec_group",
        "spot_inst_requests",
        "active_spot_fleet_requests",
        "spot_fleet_total_target_capacity",
    ],
    dynamic_prefixes: &["running_ondemand_instances_"],
};

pub const AWS_EBS_LIMITS: AwsLimitsPlugin = AwsLimitsPlugin {
    name: "aws_ebs_limits",
    service: "ebs",
    service_name: "AWS/EBS Limits %s",
    keys: &[
        "block_store_snapshots",
        "block_store_space_standard",
        "block_store_space_io1",
        "block_store_iops_io1",
        "block_store_space_io2",
        "block_store_iops_io2",
        "block_store_space_gp2",
        "block_store_space_gp3",
        "block_store_space_sc1",
        "block_store_space_st1",
    ],
    dynamic_prefixes: &[],
};

pub const AWS_ELB_LIMITS: AwsLimitsPlugin = AwsLimitsPlugin {
    name: "aws_elb_limits",
    service: "elb",
    service_name: "AWS/ELB Limits %s",
    keys: &[
        "load_balancers",
        "load_balancer_listeners",
        "load_balancer_registered_instances",
    ],
    dynamic_prefixes: &[],
};

pub const AWS_S3_LIMITS: AwsLimitsPlugin = AwsLimitsPlugin {
    name: "aws_s3_limits",
    service: "s3",
    service_name: "AWS/S3 Limits %s",
    keys: &["buckets"],
    dynamic_prefixes: &[],
};

pub const AWS_GLACIER_LIMITS: AwsLimitsPlugin = AwsLimitsPlugin {
    name: "aws_glacier_limits",
    service: "glacier",
    service_name: "AWS/Glacier Limits %s",
    keys: &["number_of_vaults"],
    dynamic_prefixes: &[],
};
