use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cmk_plugins::registry::ServiceReport;
use cmk_plugins::{parse_agent_output, Registry, State};

#[derive(Parser)]
#[command(name = "cmk-checks")]
#[command(about = "Run check plugins against agent output")]
#[command(version)]
#[command(long_about = "
Parses agent output, discovers services and runs the matching check plugins.
The exit code is the worst state of all checked services.

Examples:
  cmk-checks discover agent.out
  cmk-checks check agent.out
  agent_proxmox_ve pve01 | cmk-checks check -
  cmk-checks check agent.out --params '{\"proxmox_ve_mem_usage\": {\"levels\": [70, 80]}}'
")]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the services found in the agent output
    Discover {
        /// Agent output file, `-` reads stdin
        input: PathBuf,
    },

    /// Check every discovered service
    Check {
        /// Agent output file, `-` reads stdin
        input: PathBuf,

        /// Parameters per plugin name as a JSON object
        #[arg(long)]
        params: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(State::Unknown.value());
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let registry = Registry::with_builtin();
    let colored = !cli.no_color && console::Term::stdout().features().colors_supported();

    match cli.command {
        Commands::Discover { input } => {
            let output = parse_agent_output(&read_input(&input)?);
            let (services, labels) = registry.discover(&output);
            info!("Discovered {} services", services.len());

            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&services)?);
                return Ok(0);
            }
            for service in &services {
                println!(
                    "{}: {} ({})",
                    service.host.as_deref().unwrap_or("<local>"),
                    service.description,
                    service.plugin
                );
            }
            for (host, label) in &labels {
                println!(
                    "{}: label {}:{}",
                    host.as_deref().unwrap_or("<local>"),
                    label.name,
                    label.value
                );
            }
            Ok(0)
        }
        Commands::Check { input, params } => {
            let output = parse_agent_output(&read_input(&input)?);
            let params = parse_params(params.as_deref())?;
            let reports = registry.check_all(&output, &params);

            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    print_report(report, colored);
                }
            }

            let worst = State::worst_of(
                reports
                    .iter()
                    .filter(|report| !report.pending)
                    .map(|report| report.state),
            );
            Ok(worst.value())
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read agent output from stdin")?;
        return Ok(text);
    }
    debug!("Reading agent output from {}", path.display());
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read agent output from {}", path.display()))
}

fn parse_params(params: Option<&str>) -> Result<BTreeMap<String, Value>> {
    match params {
        Some(text) => serde_json::from_str(text).context("Parameters must be a JSON object"),
        None => Ok(BTreeMap::new()),
    }
}

fn print_report(report: &ServiceReport, colored: bool) {
    let label = if report.pending {
        "PEND".to_string()
    } else {
        report.state.to_string()
    };
    let label = if colored {
        match report.state {
            _ if report.pending => style(label).dim().to_string(),
            State::Ok => style(label).green().to_string(),
            State::Warn => style(label).yellow().to_string(),
            State::Crit => style(label).red().bold().to_string(),
            State::Unknown => style(label).magenta().to_string(),
        }
    } else {
        label
    };

    let host = match &report.service.host {
        Some(host) => format!("[{}] ", host),
        None => String::new(),
    };
    println!("{} - {}{}: {}", label, host, report.service.description, report.summary);
    for detail in &report.details {
        println!("    {}", detail);
    }
    if !report.metrics.is_empty() {
        let metrics: Vec<String> = report.metrics.iter().map(ToString::to_string).collect();
        println!("    | {}", metrics.join(" "));
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cmk_checks={0},cmk_plugins={0}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }

    #[test]
    fn test_parse_params() {
        let params = parse_params(Some(r#"{"aws_s3_limits": {"buckets": {"levels": [1, 2]}}}"#)).unwrap();
        assert!(params.contains_key("aws_s3_limits"));
        assert!(parse_params(Some("[1, 2]")).is_err());
        assert!(parse_params(None).unwrap().is_empty());
    }
}
