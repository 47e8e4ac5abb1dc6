use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const AGENT_OUTPUT: &str = r#"<<<aws_ec2_limits:sep(0)>>>
[["running_ondemand_instances_total", "Total Running On-Demand Instances", 20, 18, "eu-central-1"]]
<<<aws_elb_summary:sep(0)>>>
[{"LoadBalancerName": "web", "AvailabilityZones": ["eu-central-1a", {"ZoneName": "eu-central-1b"}]}]
<<<<pve-node01>>>>
<<<proxmox_ve_node_info:sep(0)>>>
{"status": "online", "lxc": [], "qemu": ["101"], "proxmox_ve_version": {"release": "8.1"}, "subscription": {"status": "active"}}
<<<proxmox_ve_mem_usage:sep(0)>>>
{"mem": 1073741824, "max_mem": 4294967296}
<<<<>>>>
"#;

fn agent_output_file() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("agent.out");
    fs::write(&path, AGENT_OUTPUT).unwrap();
    (dir, path)
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("cmk-checks").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Run check plugins against agent output"));
}

#[test]
fn test_discover_lists_services_per_host() {
    let (_dir, path) = agent_output_file();
    let mut cmd = Command::cargo_bin("cmk-checks").unwrap();
    cmd.arg("discover").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("<local>: AWS/EC2 Limits eu-central-1 (aws_ec2_limits)"))
        .stdout(predicate::str::contains("<local>: AWS/ELB Summary eu-central-1 (aws_elb_summary)"))
        .stdout(predicate::str::contains("pve-node01: Proxmox VE Node Info (proxmox_ve_node_info)"))
        .stdout(predicate::str::contains("pve-node01: label cmk/pve/entity:node"));
}

#[test]
fn test_check_exit_code_is_worst_state() {
    let (_dir, path) = agent_output_file();
    let mut cmd = Command::cargo_bin("cmk-checks").unwrap();
    cmd.args(["--no-color", "check"]).arg(&path);
    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains(
            "CRIT - AWS/EC2 Limits eu-central-1: Levels reached: Total Running On-Demand Instances",
        ))
        .stdout(predicate::str::contains(
            "OK - AWS/ELB Summary eu-central-1: Balancers: 1",
        ))
        .stdout(predicate::str::contains(
            "web: Europe (Frankfurt) (a), Europe (Frankfurt) (b)",
        ))
        .stdout(predicate::str::contains(
            "OK - [pve-node01] Proxmox VE Memory Usage: Usage: 25.00% - 1.00 GiB of 4.00 GiB",
        ));
}

#[test]
fn test_check_with_params() {
    let (_dir, path) = agent_output_file();
    let mut cmd = Command::cargo_bin("cmk-checks").unwrap();
    cmd.args(["--no-color", "check"]).arg(&path).args([
        "--params",
        r#"{"aws_ec2_limits": {"running_ondemand_instances_total": {"levels": [95.0, 99.0]}}}"#,
    ]);
    cmd.assert()
        .code(0)
        .stdout(predicate::str::contains("OK - AWS/EC2 Limits eu-central-1: No levels reached"));
}

#[test]
fn test_check_reads_stdin() {
    let mut cmd = Command::cargo_bin("cmk-checks").unwrap();
    cmd.args(["--no-color", "check", "-"]).write_stdin(AGENT_OUTPUT);
    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("Proxmox VE Node Info: Status: online"));
}

#[test]
fn test_missing_input_file() {
    let mut cmd = Command::cargo_bin("cmk-checks").unwrap();
    cmd.args(["check", "/nonexistent/agent.out"]);
    cmd.assert()
        .code(3)
        .stderr(predicate::str::contains("Failed to read agent output"));
}
