use std::io::{self, Write};
use std::process;

use chrono::Utc;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_proxmox_ve::{AgentContext, AgentWriter, Args, ProxmoxVeSession, Result};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let session = ProxmoxVeSession::connect(
        &args.base_url(),
        &args.username,
        &args.password,
        args.timeout(),
        !args.no_cert_check,
    )
    .await?;

    let ctx = AgentContext {
        hostname: args.hostname.clone(),
        now: Utc::now(),
        log_cutoff_weeks: args.log_cutoff_weeks,
        strict: args.debug,
        dump_logs: args.dump_logs,
        log_dir: args.log_dir(),
    };
    info!("Using {} for cached and dumped logs", ctx.log_dir.display());

    let stdout = io::stdout();
    let mut writer = AgentWriter::new(stdout.lock());
    agent_proxmox_ve::run(&ctx, &session, &mut writer).await?;
    writer.into_inner().flush()?;
    Ok(())
}

fn init_logging(args: &Args) {
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else if args.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("agent_proxmox_ve={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}
