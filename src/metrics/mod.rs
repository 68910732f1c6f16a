//! Metric registry and recording
//!
//! One counter, `rekor_consistency_check_total{status}`, owned by a registry
//! created once at startup. Skip outcomes are logged but never incremented,
//! so the label domain stays {success, failure}. The underlying prometheus
//! primitives are atomic, so the transport thread can read while the check
//! loop writes.

pub mod pull;
pub mod push;

pub use pull::spawn_metrics_server;
pub use push::spawn_push_exporter;

use crate::verifier::{CheckResult, Outcome};
use anyhow::{Context, Result};
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};
use tracing::{error, info};

/// Name of the consistency check counter.
pub const CHECK_COUNTER_NAME: &str = "rekor_consistency_check_total";

/// Owned metric state. Created once at startup; lives for the process
/// lifetime. Both transports read from the same registry, so the metric
/// name, label and semantics are identical in pull and push mode.
pub struct Metrics {
    registry: Registry,
    checks: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let checks = IntCounterVec::new(
            Opts::new(
                CHECK_COUNTER_NAME,
                "Rekor checkpoint consistency check result",
            ),
            &["status"],
        )
        .context("Failed to create check counter")?;
        registry
            .register(Box::new(checks.clone()))
            .context("Failed to register check counter")?;

        Ok(Self { registry, checks })
    }

    /// Record one classified outcome: zero or one counter increment plus
    /// exactly one log line.
    pub fn record(&self, outcome: Outcome, result: &CheckResult) {
        if let Some(status) = outcome.status_label() {
            self.checks.with_label_values(&[status]).inc();
        }

        match outcome {
            Outcome::Success => {
                info!("Rekor consistency check: SUCCESS");
            }
            Outcome::SkippedEmptyLog => {
                info!("Rekor consistency check skipped: log is empty (not an error)");
            }
            Outcome::SkippedNoCheckpoint => {
                info!("Rekor consistency check skipped: no checkpoint found (first run)");
            }
            Outcome::Failure => {
                error!(
                    exit_code = result.exit_code,
                    stderr = %result.stderr.trim(),
                    "Rekor consistency check: FAILURE"
                );
            }
        }
    }

    /// Current count for a status label. Reads the same atomic the check
    /// loop writes.
    pub fn check_count(&self, status: &str) -> u64 {
        self.checks.with_label_values(&[status]).get()
    }

    /// Encode the registry in the Prometheus text exposition format.
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .context("Failed to encode metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stderr: &str) -> CheckResult {
        CheckResult {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_success_increments_success_only() {
        let metrics = Metrics::new().unwrap();
        metrics.record(Outcome::Success, &result(0, "Consistency Verified"));

        assert_eq!(metrics.check_count("success"), 1);
        assert_eq!(metrics.check_count("failure"), 0);
    }

    #[test]
    fn test_failure_increments_failure_only() {
        let metrics = Metrics::new().unwrap();
        metrics.record(Outcome::Failure, &result(1, "connection refused"));

        assert_eq!(metrics.check_count("failure"), 1);
        assert_eq!(metrics.check_count("success"), 0);
    }

    #[test]
    fn test_skips_increment_nothing() {
        let metrics = Metrics::new().unwrap();
        metrics.record(Outcome::SkippedEmptyLog, &result(0, "empty log"));
        metrics.record(Outcome::SkippedNoCheckpoint, &result(1, "no checkpoint"));

        assert_eq!(metrics.check_count("success"), 0);
        assert_eq!(metrics.check_count("failure"), 0);
    }

    #[test]
    fn test_counter_is_monotonic_across_outcomes() {
        let metrics = Metrics::new().unwrap();
        for _ in 0..3 {
            metrics.record(Outcome::Success, &result(0, "ok"));
        }
        metrics.record(Outcome::Failure, &result(1, "bad"));

        assert_eq!(metrics.check_count("success"), 3);
        assert_eq!(metrics.check_count("failure"), 1);
    }

    #[test]
    fn test_gather_text_contains_counter() {
        let metrics = Metrics::new().unwrap();
        metrics.record(Outcome::Success, &result(0, "ok"));

        let text = metrics.gather_text().unwrap();
        assert!(text.contains(CHECK_COUNTER_NAME));
        assert!(text.contains("status=\"success\""));
    }
}
