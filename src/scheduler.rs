//! Check loop scheduling
//!
//! Strictly sequential: one verifier invocation per cycle, a fixed sleep in
//! between, never two checks in flight. The loop must outlive any transient
//! invocation error; a check that cannot even be launched is counted and
//! logged as a failure and the loop moves on to the next cycle.

use crate::config::Config;
use crate::metrics::Metrics;
use crate::verifier::{classify, run_check, CheckResult, Outcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// The polling-and-classification loop.
pub struct CheckLoop {
    config: Config,
    metrics: Arc<Metrics>,
    shutdown_flag: Arc<AtomicBool>,
}

impl CheckLoop {
    pub fn new(config: Config, metrics: Arc<Metrics>, shutdown_flag: Arc<AtomicBool>) -> Self {
        Self {
            config,
            metrics,
            shutdown_flag,
        }
    }

    /// Run checks until the shutdown flag is set. There is no other exit
    /// path; sleeps and in-flight checks are never aborted early, so the
    /// flag takes effect at the next cycle boundary.
    pub fn run_forever(&self) {
        self.run(None);
    }

    /// Run at most `max_cycles` checks. Used by `--once` mode and tests.
    pub fn run_bounded(&self, max_cycles: usize) -> Outcome {
        self.run(Some(max_cycles))
    }

    fn run(&self, max_cycles: Option<usize>) -> Outcome {
        let mut cycles = 0usize;

        loop {
            let outcome = self.run_once();
            cycles += 1;

            if let Some(max) = max_cycles {
                if cycles >= max {
                    return outcome;
                }
            }
            if self.shutdown_flag.load(Ordering::Relaxed) {
                tracing::info!("Shutdown requested, stopping check loop");
                return outcome;
            }

            thread::sleep(self.config.check_interval);

            if self.shutdown_flag.load(Ordering::Relaxed) {
                tracing::info!("Shutdown requested, stopping check loop");
                return outcome;
            }
        }
    }

    /// One full cycle: invoke, classify, record. Exactly one outcome and one
    /// log line per invocation; a spawn failure becomes a counted Failure
    /// rather than an error propagated out of the loop.
    pub fn run_once(&self) -> Outcome {
        let result = match run_check(&self.config) {
            Ok(result) => result,
            Err(e) => CheckResult {
                exit_code: -1,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        };

        let outcome = classify(&result);
        self.metrics.record(outcome, &result);
        outcome
    }
}
