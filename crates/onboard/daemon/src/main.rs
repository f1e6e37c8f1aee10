//! Onboarding Daemon - supplier onboarding batch service
//!
//! The daemon periodically:
//! - Claims eligible supplier records under a named lease
//! - Provisions a private Slack channel per supplier
//! - Invites the supplier contact (or mails a workspace sign-up link)
//! - Dispatches the commission contract for e-signature

use anyhow::Context;
use clap::{Parser, Subcommand};
use onboard_daemon::{Daemon, DaemonConfig};
use onboard_types::SupplierId;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Onboarding Daemon CLI
#[derive(Parser)]
#[command(name = "onboardd")]
#[command(about = "Onboarding Daemon - supplier channel and contract orchestration", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ONBOARD_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "ONBOARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ONBOARD_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run ticks on the configured interval until interrupted (default)
    Run,

    /// Run a single tick and print its report
    Tick,

    /// Send an errored record back through onboarding
    Requeue {
        /// Supplier id
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = DaemonConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let daemon = Daemon::new(config).await.context("starting daemon")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "Onboarding daemon starting");
            daemon.run().await?;
        }
        Command::Tick => {
            let report = daemon.tick().await?;
            if !report.acquired {
                println!("skipped: lease is held by another process");
            }
            for outcome in &report.outcomes {
                println!(
                    "{}\t{} -> {}\tcontract={}",
                    outcome.id, outcome.previous, outcome.state, outcome.contract_status
                );
            }
            for (id, error) in &report.failures {
                println!("{}\tfailed: {}", id, error);
            }
            if report.lease_lost {
                println!("lease lost mid-tick; remaining records retry once their claim is stale");
            }
        }
        Command::Requeue { id } => {
            let record = daemon
                .requeue(SupplierId::new(id))
                .await
                .with_context(|| format!("requeue supplier {}", id))?;
            println!("{}\tstate={}\tcontract={}", record.id, record.state(), record.contract_status());
        }
    }

    Ok(())
}
