#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{debug, info, warn};

use uppe_checks::config::{Settings, parse_duration};
use uppe_checks::crypto::RequestVerifier;
use uppe_checks::monitoring::{CommandExecutor, Scheduler, build_checks};
use uppe_checks::notify::WebhookNotifier;
use uppe_checks::server::run_server;

/// Run health checks from `UPPE_check_<name>=<command>` definitions and report
/// state changes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Address of the signed command endpoint
    #[arg(long, env = "UPPE_listen", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Additional dotenv file to load before reading the configuration
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Wait one interval before the first run instead of running every check
    /// at startup
    #[arg(long, env = "UPPE_no_baseline")]
    no_baseline: bool,

    /// Timeout of a single webhook delivery
    #[arg(long, value_parser = parse_duration, default_value = "10s")]
    notify_timeout: Duration,

    /// Print the resolved configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path).with_context(|| format!("Failed to load {}", path.display()))?;
    }

    logger::init();

    let settings = Settings::from_env().context("Invalid configuration")?;
    if cli.check_config {
        print!("{settings}");
        return Ok(());
    }
    debug!("{}", settings);

    let (checks, errors) = build_checks(&settings.checks, &settings.intervals);
    if !errors.is_empty() {
        warn!("Skipped {} of {} configured checks", errors.len(), settings.checks.len());
    } else if checks.is_empty() {
        warn!("No checks configured, define them as UPPE_check_<name>=<command>");
    }

    let notifier = WebhookNotifier::new(settings.webhook.clone(), cli.notify_timeout)?;
    if !notifier.is_enabled() {
        warn!("UPPE_webhook is not set, state changes will only be logged");
    }

    info!("Starting scheduler");
    let scheduler = Scheduler::new(Arc::new(CommandExecutor::new()), Arc::new(notifier))
        .with_baseline(!cli.no_baseline);
    let scheduled = scheduler.schedule_checks(checks);
    let registry = scheduled.registry.clone();
    tokio::spawn(scheduled.join());

    if let Some(secret) = settings.signing_secret.as_deref() {
        let verifier =
            RequestVerifier::new(secret).map_err(|e| anyhow!("Invalid signing key: {e}"))?;
        run_server(cli.listen, verifier, registry).await?;
    } else {
        warn!("UPPE_signingkey is not set, command endpoint disabled");
        tokio::signal::ctrl_c().await?;
    }

    info!("Shutting down");
    Ok(())
}
