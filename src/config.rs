//! Startup configuration for rekor-sentinel
//!
//! Configuration is resolved exactly once at startup: environment variables
//! first, CLI flags override, and every field has an explicit default. The
//! resulting `Config` is immutable for the process lifetime.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Fixed filename of the checkpoint file inside the checkpoint directory.
pub const CHECKPOINT_FILENAME: &str = "checkpoint_log.txt";

/// How the check counter is exposed. Selected at startup, never switched at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsMode {
    /// Serve a text-format /metrics endpoint for external scrapers.
    Pull,
    /// Periodically flush the registry to a remote collector.
    Push,
}

impl MetricsMode {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pull" => Ok(MetricsMode::Pull),
            "push" => Ok(MetricsMode::Push),
            other => bail!("Invalid METRICS_MODE '{other}' (expected 'pull' or 'push')"),
        }
    }
}

/// CLI flag overrides applied on top of the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub log_level: Option<String>,
    pub metrics_mode: Option<String>,
    pub metrics_port: Option<u16>,
    pub push_url: Option<String>,
    pub push_interval_secs: Option<u64>,
    pub check_interval_secs: Option<u64>,
    pub checkpoint_dir: Option<PathBuf>,
    pub rekor_url: Option<String>,
    pub monitor_bin: Option<PathBuf>,
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// tracing filter level (RUST_LOG still wins when set)
    pub log_level: String,
    pub metrics_mode: MetricsMode,
    /// Listen port for pull mode
    pub metrics_port: u16,
    /// Collector endpoint for push mode
    pub push_url: Option<String>,
    /// Flush interval for push mode (independent of the check interval)
    pub push_interval: Duration,
    /// Sleep between consecutive checks
    pub check_interval: Duration,
    /// Directory holding the checkpoint file
    pub checkpoint_dir: PathBuf,
    /// Rekor server the verifier checks against
    pub rekor_url: String,
    /// Path to the external verifier binary
    pub monitor_bin: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_mode: MetricsMode::Pull,
            metrics_port: 9464,
            push_url: None,
            push_interval: Duration::from_secs(15),
            check_interval: Duration::from_secs(5),
            checkpoint_dir: PathBuf::from("/data"),
            rekor_url: "https://rekor.sigstore.dev".to_string(),
            monitor_bin: PathBuf::from("./rekor_monitor"),
        }
    }
}

impl Config {
    /// Resolve configuration from the environment, then apply CLI overrides,
    /// then validate. Invalid values fail here, before the loop starts.
    pub fn load(overrides: &Overrides) -> Result<Config> {
        let defaults = Config::default();

        let log_level = overrides
            .log_level
            .clone()
            .or_else(|| env_string("LOG_LEVEL"))
            .unwrap_or(defaults.log_level);

        let mode_str = overrides
            .metrics_mode
            .clone()
            .or_else(|| env_string("METRICS_MODE"));
        let metrics_mode = match mode_str {
            Some(s) => MetricsMode::parse(&s)?,
            None => defaults.metrics_mode,
        };

        let metrics_port = match overrides.metrics_port {
            Some(p) => p,
            None => env_parsed("METRICS_PORT")?.unwrap_or(defaults.metrics_port),
        };

        let push_url = overrides
            .push_url
            .clone()
            .or_else(|| env_string("METRICS_PUSH_URL"));

        let push_interval_secs = match overrides.push_interval_secs {
            Some(s) => s,
            None => env_parsed("METRICS_PUSH_INTERVAL_SECONDS")?
                .unwrap_or(defaults.push_interval.as_secs()),
        };

        let check_interval_secs = match overrides.check_interval_secs {
            Some(s) => s,
            None => {
                env_parsed("CHECK_INTERVAL_SECONDS")?.unwrap_or(defaults.check_interval.as_secs())
            }
        };

        let checkpoint_dir = overrides
            .checkpoint_dir
            .clone()
            .or_else(|| env_string("CHECKPOINT_DIR").map(PathBuf::from))
            .unwrap_or(defaults.checkpoint_dir);

        let rekor_url = overrides
            .rekor_url
            .clone()
            .or_else(|| env_string("REKOR_SERVER_ENDPOINT"))
            .unwrap_or(defaults.rekor_url);

        let monitor_bin = overrides
            .monitor_bin
            .clone()
            .or_else(|| env_string("REKOR_MONITOR_BIN").map(PathBuf::from))
            .unwrap_or(defaults.monitor_bin);

        let config = Config {
            log_level,
            metrics_mode,
            metrics_port,
            push_url,
            push_interval: Duration::from_secs(push_interval_secs),
            check_interval: Duration::from_secs(check_interval_secs),
            checkpoint_dir,
            rekor_url,
            monitor_bin,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.metrics_mode == MetricsMode::Push && self.push_url.is_none() {
            bail!("METRICS_MODE=push requires METRICS_PUSH_URL to be set");
        }
        Ok(())
    }

    /// Full path of the checkpoint file passed to the verifier.
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_dir.join(CHECKPOINT_FILENAME)
    }
}

/// Read a non-empty environment variable.
fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Read and parse an environment variable, failing on malformed values
/// rather than silently falling back to the default.
fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_string(name) {
        Some(v) => {
            let parsed = v
                .parse::<T>()
                .with_context(|| format!("Invalid value '{v}' for {name}"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
