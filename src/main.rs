use anyhow::{Context, Result};
use clap::Parser;
use rekor_sentinel::config::{Config, MetricsMode, Overrides};
use rekor_sentinel::metrics::{spawn_metrics_server, spawn_push_exporter, Metrics};
use rekor_sentinel::scheduler::CheckLoop;
use rekor_sentinel::verifier::{resolve_monitor_bin, Outcome};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rekor-sentinel")]
#[command(about = "Rekor checkpoint consistency watchdog", long_about = None)]
#[command(version)]
struct Cli {
    /// Run a single check cycle and exit (exit code 1 on failure)
    #[arg(long)]
    once: bool,

    /// Seconds to sleep between checks [env: CHECK_INTERVAL_SECONDS]
    #[arg(short, long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Metrics transport: pull or push [env: METRICS_MODE]
    #[arg(long, value_name = "MODE")]
    metrics_mode: Option<String>,

    /// Listen port for the pull-mode /metrics endpoint [env: METRICS_PORT]
    #[arg(long, value_name = "PORT")]
    metrics_port: Option<u16>,

    /// Collector endpoint for push mode [env: METRICS_PUSH_URL]
    #[arg(long, value_name = "URL")]
    push_url: Option<String>,

    /// Seconds between push-mode flushes [env: METRICS_PUSH_INTERVAL_SECONDS]
    #[arg(long, value_name = "SECONDS")]
    push_interval: Option<u64>,

    /// Directory containing the checkpoint file [env: CHECKPOINT_DIR]
    #[arg(long, value_name = "DIR")]
    checkpoint_dir: Option<PathBuf>,

    /// Rekor server endpoint the verifier checks against
    /// [env: REKOR_SERVER_ENDPOINT]
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Path to the rekor_monitor binary [env: REKOR_MONITOR_BIN]
    #[arg(long, value_name = "PATH")]
    monitor_bin: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [env: LOG_LEVEL]
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        log_level: cli.log_level.clone(),
        metrics_mode: cli.metrics_mode.clone(),
        metrics_port: cli.metrics_port,
        push_url: cli.push_url.clone(),
        push_interval_secs: cli.push_interval,
        check_interval_secs: cli.interval,
        checkpoint_dir: cli.checkpoint_dir.clone(),
        rekor_url: cli.url.clone(),
        monitor_bin: cli.monitor_bin.clone(),
    };
    let config = Config::load(&overrides)?;

    init_tracing(&config.log_level)?;

    tracing::info!(
        monitor_bin = %config.monitor_bin.display(),
        checkpoint = %config.checkpoint_path().display(),
        rekor_url = %config.rekor_url,
        check_interval_secs = config.check_interval.as_secs(),
        metrics_mode = ?config.metrics_mode,
        "Starting rekor-sentinel"
    );

    // Report a missing verifier up front; the loop itself still tolerates it
    // on every cycle.
    if resolve_monitor_bin(&config.monitor_bin).is_none() {
        tracing::warn!(
            monitor_bin = %config.monitor_bin.display(),
            "Verifier binary not found; checks will be counted as failures until it appears"
        );
    }

    let metrics = Arc::new(Metrics::new()?);
    let shutdown_flag = Arc::new(AtomicBool::new(false));

    if !cli.once {
        match config.metrics_mode {
            MetricsMode::Pull => {
                spawn_metrics_server(
                    Arc::clone(&metrics),
                    config.metrics_port,
                    Arc::clone(&shutdown_flag),
                )?;
            }
            MetricsMode::Push => {
                // validated at startup: push mode always has a URL
                let url = config
                    .push_url
                    .clone()
                    .context("Push mode selected without a collector URL")?;
                spawn_push_exporter(
                    Arc::clone(&metrics),
                    url,
                    config.push_interval,
                    Arc::clone(&shutdown_flag),
                )?;
            }
        }

        let flag = Arc::clone(&shutdown_flag);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .context("Failed to install signal handler")?;
    }

    let check_loop = CheckLoop::new(config, metrics, shutdown_flag);

    if cli.once {
        let outcome = check_loop.run_bounded(1);
        if outcome == Outcome::Failure {
            std::process::exit(1);
        }
        return Ok(());
    }

    check_loop.run_forever();
    tracing::info!("rekor-sentinel stopped");
    Ok(())
}

/// Install the global tracing subscriber. RUST_LOG wins when set; otherwise
/// the configured level applies.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .with_context(|| format!("Invalid log level '{log_level}'"))?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
