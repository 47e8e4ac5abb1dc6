//! Data collection and agent output for one Proxmox VE cluster

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::backup_log::{
    collect_vm_backup_info, lines_from_entries, BackupLogParser, BackupRecord, ParsedLog,
};
use crate::cache::{JsonCache, LOG_CACHE_FILE};
use crate::error::{AgentError, Result};
use crate::output::AgentWriter;
use crate::tree::{get_tree, ApiSource, Request};

const SUBSCRIPTION_KEYS: [&str; 7] = [
    "status",
    "checktime",
    "key",
    "level",
    "nextduedate",
    "productname",
    "regdate",
];

/// Settings of one agent run
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// Name of the queried Proxmox VE host
    pub hostname: String,
    pub now: DateTime<Utc>,
    /// Only backup tasks started within this many weeks are evaluated
    pub log_cutoff_weeks: u32,
    /// Abort on the first backup log problem
    pub strict: bool,
    /// Write every backup log to `log_dir`
    pub dump_logs: bool,
    /// Base directory for the log cache and dumped logs
    pub log_dir: PathBuf,
}

impl AgentContext {
    pub fn cutoff(&self) -> i64 {
        (self.now - Duration::weeks(i64::from(self.log_cutoff_weeks))).timestamp()
    }

    pub fn cache_file(&self) -> PathBuf {
        self.log_dir.join(&self.hostname).join(LOG_CACHE_FILE)
    }
}

/// Everything the agent asks the API for in one run
pub fn cluster_request() -> Result<Request> {
    Request::from_value(&json!({
        "cluster": {
            "backup": [],
            "resources": [],
        },
        "nodes": [{
            "{node}": {
                "subscription": {},
                "tasks": [],
                "qemu": [{"{vmid}": {"snapshot": []}}],
                "lxc": [{"{vmid}": {"snapshot": []}}],
                "version": {},
                "time": {},
            }
        }],
        "version": {},
    }))
}

/// Fetch cluster data and write all sections
pub async fn run<W: Write>(
    ctx: &AgentContext,
    api: &dyn ApiSource,
    writer: &mut AgentWriter<W>,
) -> Result<()> {
    info!("Fetch general cluster and node information..");
    let data = get_tree(api, &cluster_request()?).await?;
    let nodes = list(&data["nodes"]);

    info!("Fetch and process backup logs..");
    let mut backups = fetch_backup_data(ctx, api, nodes).await?;

    let all_vms = all_vms(list(&data["cluster"]["resources"]));
    localize_started_times(&mut backups, &all_vms, nodes);
    let snapshots = snapshot_data(nodes);

    info!("all VMs:          {:?}", all_vms.keys().collect::<Vec<_>>());
    info!(
        "expected backups: {:?}",
        scheduled_vmids(list(&data["cluster"]["backup"]))
    );
    info!("actual backups:   {:?}", backups.keys().collect::<Vec<_>>());
    debug!("snaptimes:        {:?}", snapshots);

    info!("Write agent output..");
    for node in nodes {
        write_node(ctx, writer, node, &all_vms)?;
    }
    for (vmid, vm) in &all_vms {
        write_vm(writer, vmid, vm, backups.get(vmid), snapshots.get(vmid))?;
    }
    Ok(())
}

/// Parse the logs of recent vzdump tasks, the latest backup per VM wins
///
/// Logs are read through the cache file so each task log is fetched once.
pub async fn fetch_backup_data(
    ctx: &AgentContext,
    api: &dyn ApiSource,
    nodes: &[Value],
) -> Result<BTreeMap<String, BackupRecord>> {
    let cutoff = ctx.cutoff();
    let mut cache = JsonCache::load(ctx.cache_file(), cutoff);
    let mut parsed_logs = Vec::new();

    let fetched = fetch_task_logs(ctx, api, nodes, &mut cache, &mut parsed_logs).await;
    if let Err(e) = cache.save() {
        warn!("Could not write log cache {}: {}", cache.path().display(), e);
    }
    fetched?;
    Ok(collect_vm_backup_info(parsed_logs))
}

async fn fetch_task_logs(
    ctx: &AgentContext,
    api: &dyn ApiSource,
    nodes: &[Value],
    cache: &mut JsonCache,
    parsed_logs: &mut Vec<ParsedLog>,
) -> Result<()> {
    let cutoff = ctx.cutoff();
    for node in nodes {
        let Some(node_name) = node["node"].as_str() else {
            continue;
        };
        for task in list(&node["tasks"]) {
            if task["type"].as_str() != Some("vzdump") {
                continue;
            }
            let (Some(upid), Some(starttime)) = (task["upid"].as_str(), as_i64(&task["starttime"]))
            else {
                continue;
            };
            if starttime < cutoff {
                continue;
            }

            let path = format!("nodes/{}/tasks/{}/log", node_name, upid);
            let log = cache
                .get_or_fetch(upid, starttime, || api.get_api_element(&path))
                .await?;
            parsed_logs.push(parse_task_log(ctx, upid, list(&log))?);
        }
    }
    Ok(())
}

fn parse_task_log(ctx: &AgentContext, upid: &str, entries: &[Value]) -> Result<ParsedLog> {
    let lines = lines_from_entries(entries);
    if ctx.dump_logs {
        dump_log(&ctx.log_dir.join(format!("{}.log", upid)), &lines, &[])?;
        debug!("Wrote log of {} to {}", upid, ctx.log_dir.display());
    }

    let parsed = BackupLogParser::parse(
        lines.iter().map(|(number, line)| (*number, line.as_str())),
        ctx.strict,
    )?;

    if !parsed.errors.is_empty() {
        let path = ctx.log_dir.join(format!("erroneous-{}.log", upid));
        error!(
            "Parsing the log for UPID={:?} resulted in error(s) - write log content to {}",
            upid,
            path.display()
        );
        let errors: Vec<(usize, String)> = parsed
            .errors
            .iter()
            .map(|e| (e.line, e.message.clone()))
            .collect();
        if let Err(e) = dump_log(&path, &lines, &errors) {
            warn!("Could not write {}: {}", path.display(), e);
        }
    }
    Ok(parsed)
}

fn dump_log(path: &Path, lines: &[(usize, String)], errors: &[(usize, String)]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    for (_, line) in lines {
        writeln!(file, "{}", line)?;
    }
    for (number, message) in errors {
        writeln!(file, "PARSE-ERROR: {}: {}", number, message)?;
    }
    Ok(())
}

/// LXC containers and Qemu VMs with a known state by VM id
fn all_vms(resources: &[Value]) -> BTreeMap<String, &Value> {
    resources
        .iter()
        .filter(|entry| matches!(entry["type"].as_str(), Some("lxc") | Some("qemu")))
        .filter(|entry| entry["status"].as_str() != Some("unknown"))
        .filter_map(|entry| Some((id_string(&entry["vmid"])?, entry)))
        .collect()
}

/// VM ids assigned to enabled backup jobs
fn scheduled_vmids(jobs: &[Value]) -> BTreeSet<String> {
    jobs.iter()
        .filter(|job| matches!(&job["enabled"], Value::String(s) if s == "1") || job["enabled"] == 1)
        .filter_map(|job| job["vmid"].as_str())
        .flat_map(|vmids| vmids.split(','))
        .map(|vmid| vmid.trim().to_string())
        .collect()
}

fn snapshot_data(nodes: &[Value]) -> BTreeMap<String, Value> {
    nodes
        .iter()
        .flat_map(|node| list(&node["lxc"]).iter().chain(list(&node["qemu"])))
        .filter_map(|vm| {
            let snaptimes: Vec<Value> = list(&vm["snapshot"])
                .iter()
                .filter_map(|snapshot| snapshot.get("snaptime").cloned())
                .collect();
            Some((id_string(&vm["vmid"])?, json!({ "snaptimes": snaptimes })))
        })
        .collect()
}

/// UTC offset of a node from its `time` element
fn node_offset(node: &Value) -> Option<FixedOffset> {
    let time = as_i64(&node["time"]["time"])?;
    let localtime = as_i64(&node["time"]["localtime"])?;
    FixedOffset::east_opt(i32::try_from(localtime - time).ok()?)
}

/// Rewrite naive backup start times to the local time of the VM's node
fn localize_started_times(
    backups: &mut BTreeMap<String, BackupRecord>,
    all_vms: &BTreeMap<String, &Value>,
    nodes: &[Value],
) {
    let offsets: BTreeMap<&str, FixedOffset> = nodes
        .iter()
        .filter_map(|node| Some((node["node"].as_str()?, node_offset(node)?)))
        .collect();
    let fallback = nodes
        .iter()
        .find_map(node_offset)
        .or_else(|| FixedOffset::east_opt(0));

    for (vmid, record) in backups.iter_mut() {
        let Some(offset) = all_vms
            .get(vmid)
            .and_then(|vm| vm["node"].as_str())
            .and_then(|node| offsets.get(node))
            .copied()
            .or(fallback)
        else {
            continue;
        };
        if let Some(started) = record.started_time.as_deref() {
            if let Some(localized) = localize(started, offset) {
                record.started_time = Some(localized);
            }
        }
    }
}

fn localize(naive: &str, offset: FixedOffset) -> Option<String> {
    let parsed = NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S").ok()?;
    let local = offset.from_local_datetime(&parsed).single()?;
    Some(local.format("%Y-%m-%d %H:%M:%S%z").to_string())
}

fn write_node<W: Write>(
    ctx: &AgentContext,
    writer: &mut AgentWriter<W>,
    node: &Value,
    all_vms: &BTreeMap<String, &Value>,
) -> Result<()> {
    let Some(name) = node["node"].as_str() else {
        return Err(AgentError::unexpected_shape("nodes", "node without name"));
    };
    if node["type"].as_str() != Some("node") {
        warn!("Skipping {:?} of type {}", name, node["type"]);
        return Ok(());
    }

    let piggyback = if ctx.hostname.starts_with(&format!("{}.", name)) {
        None
    } else {
        Some(name)
    };
    let vmids_of_type = |vm_type: &str| -> Vec<&str> {
        all_vms
            .iter()
            .filter(|(_, vm)| vm["type"].as_str() == Some(vm_type))
            .map(|(vmid, _)| vmid.as_str())
            .collect()
    };
    let subscription: Map<String, Value> = node["subscription"]
        .as_object()
        .map(|subscription| {
            subscription
                .iter()
                .filter(|(key, _)| SUBSCRIPTION_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    writer.piggyback(piggyback, |w| {
        w.json_section(
            "proxmox_ve_node_info",
            &json!({
                "status": node["status"],
                "lxc": vmids_of_type("lxc"),
                "qemu": vmids_of_type("qemu"),
                "proxmox_ve_version": node["version"],
                "time_info": node["time"],
                "subscription": subscription,
            }),
        )?;
        if !node["mem"].is_null() {
            w.json_section(
                "proxmox_ve_mem_usage",
                &json!({"mem": node["mem"], "max_mem": node["maxmem"]}),
            )?;
        }
        if !node["uptime"].is_null() {
            w.raw_section("uptime", &[node["uptime"].to_string()])?;
        }
        Ok(())
    })
}

fn write_vm<W: Write>(
    writer: &mut AgentWriter<W>,
    vmid: &str,
    vm: &Value,
    last_backup: Option<&BackupRecord>,
    snapshots: Option<&Value>,
) -> Result<()> {
    let Some(name) = vm["name"].as_str() else {
        warn!("Skipping VM {} without a name", vmid);
        return Ok(());
    };

    writer.piggyback(Some(name), |w| {
        w.json_section(
            "proxmox_ve_vm_info",
            &json!({
                "vmid": vmid,
                "node": vm["node"],
                "type": vm["type"],
                "status": vm["status"],
                "name": name,
                "uptime": vm["uptime"],
            }),
        )?;
        if vm["type"].as_str() != Some("qemu") {
            w.json_section(
                "proxmox_ve_disk_usage",
                &json!({"disk": vm["disk"], "max_disk": vm["maxdisk"]}),
            )?;
        }
        w.json_section(
            "proxmox_ve_disk_throughput",
            &json!({
                "disk_read": vm["diskread"],
                "disk_write": vm["diskwrite"],
                "uptime": vm["uptime"],
            }),
        )?;
        w.json_section(
            "proxmox_ve_mem_usage",
            &json!({"mem": vm["mem"], "max_mem": vm["maxmem"]}),
        )?;
        w.json_section(
            "proxmox_ve_network_throughput",
            &json!({
                "net_in": vm["netin"],
                "net_out": vm["netout"],
                "uptime": vm["uptime"],
            }),
        )?;
        w.json_section(
            "proxmox_ve_cpu_util",
            &json!({
                "cpu": vm["cpu"],
                "max_cpu": vm["maxcpu"],
                "uptime": vm["uptime"],
            }),
        )?;
        w.json_section(
            "proxmox_ve_vm_backup_status",
            &json!({ "last_backup": last_backup }),
        )?;
        w.json_section("proxmox_ve_vm_snapshot_age", &snapshots)
    })
}

fn list(value: &Value) -> &[Value] {
    value.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
