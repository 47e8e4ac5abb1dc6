use std::collections::{BTreeMap, BTreeSet};

use agent_proxmox_ve::{run, AgentContext, AgentWriter};
use anyhow::Result;
use cmk_plugins::registry::ServiceReport;
use cmk_plugins::{parse_agent_output, AgentOutput, HostLabel, State};
use serde_json::json;
use tempfile::TempDir;

use crate::mocks::{checking_registry, now, pve_cluster, task_log, vzdump_log, MockApi, BACKUP_UPID};
use crate::test_setup;

fn context(dir: &TempDir) -> AgentContext {
    AgentContext {
        hostname: "pve-cluster".to_string(),
        now: now(),
        log_cutoff_weeks: 2,
        strict: false,
        dump_logs: false,
        log_dir: dir.path().to_path_buf(),
    }
}

async fn agent_output(ctx: &AgentContext, api: &MockApi) -> Result<AgentOutput> {
    let mut writer = AgentWriter::new(Vec::new());
    run(ctx, api, &mut writer).await?;
    let text = String::from_utf8(writer.into_inner())?;
    Ok(parse_agent_output(&text))
}

fn report<'a>(reports: &'a [ServiceReport], host: &str, description: &str) -> &'a ServiceReport {
    reports
        .iter()
        .find(|r| r.service.host.as_deref() == Some(host) && r.service.description == description)
        .unwrap_or_else(|| panic!("no service {:?} on {}", description, host))
}

#[tokio::test]
async fn test_discovery_on_piggyback_hosts() -> Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let output = agent_output(&context(&dir), &pve_cluster(vzdump_log())).await?;

    let hosts: Vec<Option<&str>> = output.hosts().collect();
    assert_eq!(hosts, vec![Some("db"), Some("pve1"), Some("web")]);

    let (services, labels) = checking_registry().discover(&output);
    let discovered: BTreeSet<(String, String)> = services
        .into_iter()
        .map(|s| (s.host.unwrap_or_default(), s.description))
        .collect();
    let expected: BTreeSet<(String, String)> = [
        ("db", "Proxmox VE Disk Usage"),
        ("db", "Proxmox VE Memory Usage"),
        ("db", "Proxmox VE VM Backup Status"),
        ("db", "Proxmox VE VM Snapshot age"),
        ("pve1", "Proxmox VE Memory Usage"),
        ("pve1", "Proxmox VE Node Info"),
        ("web", "Proxmox VE Memory Usage"),
        ("web", "Proxmox VE VM Backup Status"),
        ("web", "Proxmox VE VM Snapshot age"),
    ]
    .into_iter()
    .map(|(host, description)| (host.to_string(), description.to_string()))
    .collect();
    assert_eq!(discovered, expected);

    assert_eq!(
        labels,
        vec![(Some("pve1".to_string()), HostLabel::new("cmk/pve/entity", "node"))]
    );
    Ok(())
}

#[tokio::test]
async fn test_check_states_of_cluster() -> Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let output = agent_output(&context(&dir), &pve_cluster(vzdump_log())).await?;
    let reports = checking_registry().check_all(&output, &BTreeMap::new());
    assert!(reports.iter().all(|r| !r.pending));

    let node = report(&reports, "pve1", "Proxmox VE Node Info");
    assert_eq!(node.state, State::Ok);
    assert_eq!(
        node.summary,
        "Status: online, Subscription: active, Version: 8.1, Hosted VMs: 1 LXCs, 1 Qemu VMs"
    );
    assert_eq!(report(&reports, "pve1", "Proxmox VE Memory Usage").state, State::Ok);

    // started 2024-03-01 01:00:01 UTC, 35 hours before now
    let backup = report(&reports, "web", "Proxmox VE VM Backup Status");
    assert_eq!(backup.state, State::Warn);
    assert!(backup.summary.contains("Server local start time: 2024-03-01 02:00:01"));
    let bandwidth = backup
        .metrics
        .iter()
        .find(|m| m.name == "backup_avgspeed")
        .map(|m| m.value);
    assert_eq!(bandwidth, Some(34_359_738_368.0 / 120.0));

    let missing = report(&reports, "db", "Proxmox VE VM Backup Status");
    assert_eq!(missing.state, State::Crit);
    assert_eq!(missing.summary, "No backup found");

    assert_eq!(report(&reports, "web", "Proxmox VE VM Snapshot age").state, State::Crit);
    let no_snapshots = report(&reports, "db", "Proxmox VE VM Snapshot age");
    assert_eq!(no_snapshots.state, State::Ok);
    assert_eq!(no_snapshots.summary, "No snapshot found");

    assert_eq!(report(&reports, "db", "Proxmox VE Disk Usage").state, State::Warn);
    Ok(())
}

#[tokio::test]
async fn test_configured_parameters_change_states() -> Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let output = agent_output(&context(&dir), &pve_cluster(vzdump_log())).await?;

    let mut params = BTreeMap::new();
    params.insert(
        "proxmox_ve_vm_backup_status".to_string(),
        json!({"age_levels_upper": [172800.0, 345600.0], "no_backup_state": "warn"}),
    );
    params.insert("proxmox_ve_disk_usage".to_string(), json!({"levels": null}));
    let reports = checking_registry().check_all(&output, &params);

    assert_eq!(report(&reports, "web", "Proxmox VE VM Backup Status").state, State::Ok);
    assert_eq!(report(&reports, "db", "Proxmox VE VM Backup Status").state, State::Warn);
    assert_eq!(report(&reports, "db", "Proxmox VE Disk Usage").state, State::Ok);
    Ok(())
}

#[tokio::test]
async fn test_second_run_reads_logs_from_cache() -> Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let ctx = context(&dir);
    let log_path = format!("nodes/pve1/tasks/{}/log", BACKUP_UPID);

    let api = pve_cluster(vzdump_log());
    agent_output(&ctx, &api).await?;
    assert_eq!(api.request_count(&log_path), 1);
    assert!(!api.requested().iter().any(|path| path.contains("UPID:pve1:0000")));

    let api = pve_cluster(task_log(&[]));
    let output = agent_output(&ctx, &api).await?;
    assert_eq!(api.request_count(&log_path), 0);

    let reports = checking_registry().check_all(&output, &BTreeMap::new());
    assert_eq!(report(&reports, "web", "Proxmox VE VM Backup Status").state, State::Warn);
    Ok(())
}

#[tokio::test]
async fn test_broken_log_leaves_vm_without_backup() -> Result<()> {
    test_setup!();
    let dir = TempDir::new()?;
    let api = pve_cluster(task_log(&[
        "INFO: Starting Backup of VM 101 (qemu)",
        "INFO: Starting Backup of VM 102 (lxc)",
    ]));
    let output = agent_output(&context(&dir), &api).await?;
    let reports = checking_registry().check_all(&output, &BTreeMap::new());

    let backup = report(&reports, "web", "Proxmox VE VM Backup Status");
    assert_eq!(backup.state, State::Crit);
    assert_eq!(backup.summary, "No backup found");
    Ok(())
}
