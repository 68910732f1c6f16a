//! Verifier invocation
//!
//! Launches the external rekor_monitor binary in single-shot mode and captures
//! its exit status and output streams. Non-zero exit is a normal result to be
//! classified, not an error; only a failure to start the subprocess at all
//! surfaces as `InvokeError`.

pub mod classify;

pub use classify::{classify, Outcome};

use crate::config::Config;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Captured result of one verifier invocation. Produced exactly once per
/// check cycle and consumed synchronously by the classifier.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Process exit code (-1 if terminated by a signal)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("failed to launch verifier '{bin}': {source}")]
    Spawn {
        bin: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Run one consistency check and block until the verifier exits.
///
/// Invocation shape: `<bin> --file=<checkpoint> --once=true --url=<endpoint>`.
/// The verifier's own `--once` flag guarantees termination, so no internal
/// timeout is applied.
pub fn run_check(config: &Config) -> Result<CheckResult, InvokeError> {
    let output = Command::new(&config.monitor_bin)
        .arg(format!("--file={}", config.checkpoint_path().display()))
        .arg("--once=true")
        .arg(format!("--url={}", config.rekor_url))
        .output()
        .map_err(|source| InvokeError::Spawn {
            bin: config.monitor_bin.clone(),
            source,
        })?;

    Ok(CheckResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Resolve a bare verifier command name against PATH so a missing binary is
/// reported at startup rather than only on the first cycle. Relative and
/// absolute paths are returned as-is.
pub fn resolve_monitor_bin(bin: &Path) -> Option<PathBuf> {
    if bin.components().count() > 1 || bin.is_absolute() {
        return bin.exists().then(|| bin.to_path_buf());
    }
    which::which(bin).ok()
}
