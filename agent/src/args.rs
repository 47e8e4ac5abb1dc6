use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "agent_proxmox_ve")]
#[command(about = "Special agent for Proxmox VE clusters")]
#[command(version)]
#[command(long_about = "
Queries the Proxmox VE REST API and writes node, VM, backup and snapshot
information as agent sections to stdout. Sections of other cluster nodes and
of VMs are piggybacked to hosts of the same name.

Examples:
  agent_proxmox_ve -u monitoring@pve -p secret pve01.example.com
  agent_proxmox_ve --port 8443 --no-cert-check --log-cutoff-weeks 4 pve01
  PVE_PASSWORD=secret agent_proxmox_ve -u monitoring@pve --debug pve01
")]
pub struct Args {
    /// Name of the Proxmox VE instance to query
    pub hostname: String,

    /// Port of the Proxmox VE API
    #[arg(long, default_value_t = 8006)]
    pub port: u16,

    /// Username for the connection, e.g. monitoring@pve
    #[arg(short, long, env = "PVE_USERNAME", default_value = "")]
    pub username: String,

    /// Password for the connection
    #[arg(short, long, env = "PVE_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// API call timeout in seconds
    #[arg(short, long, default_value_t = 50)]
    pub timeout: u64,

    /// Fetch backup logs N weeks back in time
    #[arg(long, default_value_t = 2)]
    pub log_cutoff_weeks: u32,

    /// Dump all backup logs to the log directory
    #[arg(long)]
    pub dump_logs: bool,

    /// Do not verify the TLS certificate of the API
    #[arg(long)]
    pub no_cert_check: bool,

    /// Enable debug logging and abort on backup log parse problems
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory for the log cache and dumped logs
    #[arg(long, env = "PVE_AGENT_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl Args {
    pub fn base_url(&self) -> String {
        format!("https://{}:{}/", self.hostname, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// `--cache-dir` or the user's cache directory
    pub fn log_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("agent_proxmox_ve")
        })
    }
}
