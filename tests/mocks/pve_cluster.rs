use chrono::{DateTime, TimeZone, Utc};
use cmk_plugins::plugins::proxmox_ve::{
    Clock, ProxmoxVeDiskUsage, ProxmoxVeMemUsage, ProxmoxVeNodeInfo, ProxmoxVeVmBackupStatus,
    ProxmoxVeVmSnapshotAge,
};
use cmk_plugins::Registry;
use serde_json::{json, Value};

use super::MockApi;

/// 2024-03-02 12:00:00 UTC
pub const NOW: i64 = 1_709_380_800;
/// 2024-03-01 01:00:00 UTC
pub const TASK_START: i64 = 1_709_254_800;
pub const BACKUP_UPID: &str = "UPID:pve1:0001:vzdump";

/// Task log of a successful vzdump run for VM 101
pub fn vzdump_log() -> Value {
    task_log(&[
        "INFO: starting new backup job: vzdump 101 --storage local",
        "INFO: Starting Backup of VM 101 (qemu)",
        "INFO: Backup started at 2024-03-01 02:00:01",
        "INFO: creating vzdump archive '/var/lib/vz/dump/vzdump-qemu-101.vma.zst'",
        "INFO: transferred 32.00 GiB in 120 seconds (273.1 MiB/s)",
        "INFO: archive file size: 4.21GB",
        "INFO: Finished Backup of VM 101 (00:02:05)",
    ])
}

/// Lines as served by `nodes/{node}/tasks/{upid}/log`
pub fn task_log(lines: &[&str]) -> Value {
    Value::Array(
        lines
            .iter()
            .enumerate()
            .map(|(i, t)| json!({"n": i + 1, "t": t}))
            .collect(),
    )
}

/// A single node cluster: qemu VM `web` with a backup and an old snapshot,
/// container `db` without either, and VM `ghost` on an unreachable node.
pub fn pve_cluster(log: Value) -> MockApi {
    let log_path = format!("nodes/pve1/tasks/{}/log", BACKUP_UPID);
    MockApi::new([
        ("", json!([{"subdir": "cluster"}, {"subdir": "nodes"}, {"subdir": "version"}])),
        ("version", json!({"release": "8.1", "version": "8.1.4"})),
        ("cluster", json!([{"name": "backup"}, {"name": "resources"}])),
        ("cluster/backup", json!([{"id": "nightly", "enabled": 1, "vmid": "101,102"}])),
        (
            "cluster/resources",
            json!([
                {"type": "qemu", "vmid": 101, "name": "web", "node": "pve1", "status": "running",
                 "mem": 1073741824u64, "maxmem": 4294967296u64, "disk": 0, "maxdisk": 34359738368u64,
                 "diskread": 10, "diskwrite": 20, "netin": 30, "netout": 40,
                 "cpu": 0.05, "maxcpu": 2, "uptime": 86400},
                {"type": "lxc", "vmid": 102, "name": "db", "node": "pve1", "status": "running",
                 "mem": 536870912u64, "maxmem": 2147483648u64, "disk": 3650722202u64,
                 "maxdisk": 4294967296u64, "diskread": 0, "diskwrite": 0, "netin": 0,
                 "netout": 0, "cpu": 0.01, "maxcpu": 1, "uptime": 3600},
                {"type": "qemu", "vmid": 103, "name": "ghost", "node": "pve2", "status": "unknown"},
                {"type": "node", "node": "pve1", "status": "online"},
                {"type": "storage", "storage": "local", "node": "pve1"},
            ]),
        ),
        (
            "nodes",
            json!([{"node": "pve1", "type": "node", "status": "online",
                    "mem": 17179869184u64, "maxmem": 68719476736u64, "uptime": 1209600}]),
        ),
        (
            "nodes/pve1",
            json!([{"name": "subscription"}, {"name": "tasks"}, {"name": "qemu"},
                   {"name": "lxc"}, {"name": "version"}, {"name": "time"}]),
        ),
        (
            "nodes/pve1/subscription",
            json!({"status": "active", "level": "c", "serverid": "SECRET", "key": "pve2c-0000"}),
        ),
        (
            "nodes/pve1/tasks",
            json!([
                {"upid": BACKUP_UPID, "type": "vzdump", "starttime": TASK_START},
                {"upid": "UPID:pve1:0000:vzdump", "type": "vzdump", "starttime": 1_600_000_000},
                {"upid": "UPID:pve1:0002:qmstart", "type": "qmstart", "starttime": TASK_START},
            ]),
        ),
        (log_path.as_str(), log),
        ("nodes/pve1/qemu", json!([{"vmid": 101, "name": "web"}])),
        ("nodes/pve1/qemu/101", json!([{"subdir": "snapshot"}, {"subdir": "status"}])),
        (
            "nodes/pve1/qemu/101/snapshot",
            json!([{"name": "current", "running": 1},
                   {"name": "pre-upgrade", "snaptime": 1_700_000_000}]),
        ),
        ("nodes/pve1/lxc", json!([{"vmid": 102, "name": "db"}])),
        ("nodes/pve1/lxc/102", json!([{"subdir": "snapshot"}])),
        ("nodes/pve1/lxc/102/snapshot", json!([{"name": "current", "running": 1}])),
        ("nodes/pve1/version", json!({"release": "8.1", "version": "8.1.4"})),
        (
            "nodes/pve1/time",
            json!({"time": NOW, "localtime": NOW + 3600, "timezone": "Europe/Berlin"}),
        ),
    ])
}

pub fn now() -> DateTime<Utc> {
    Utc.timestamp_opt(NOW, 0).single().unwrap_or_default()
}

/// The Proxmox VE plugins with their clocks fixed to [`NOW`]
pub fn checking_registry() -> Registry {
    let clock = Clock::fixed(now());
    let mut registry = Registry::new();
    registry.register(ProxmoxVeNodeInfo);
    registry.register(ProxmoxVeMemUsage);
    registry.register(ProxmoxVeDiskUsage);
    registry.register(ProxmoxVeVmBackupStatus::with_clock(clock));
    registry.register(ProxmoxVeVmSnapshotAge::with_clock(clock));
    registry
}
