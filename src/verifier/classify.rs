//! Outcome classification
//!
//! The verifier signals benign non-error conditions (empty log, missing
//! checkpoint on first run) through exit code 0 plus specific text markers on
//! its error stream, not through distinct exit codes. Classification therefore
//! inspects output text as well as exit status. The markers and their priority
//! order are part of the upstream contract and must not change.

use super::CheckResult;

/// Marker emitted when the consistency proof verified cleanly.
pub const VERIFIED_MARKER: &str = "consistency verified";

/// Marker emitted when the log is empty and no proof can be computed.
pub const EMPTY_LOG_MARKER: &str =
    "consistency proofs can not be computed starting from an empty log";

/// Marker emitted on first run, before any checkpoint has been written.
pub const NO_CHECKPOINT_MARKER: &str = "no start index set and no log checkpoint";

/// Classified outcome of one check. Skip variants are logged but never
/// counted; only Success and Failure increment the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    SkippedEmptyLog,
    SkippedNoCheckpoint,
    Failure,
}

impl Outcome {
    /// Counter label value, if this outcome is counted at all.
    pub fn status_label(&self) -> Option<&'static str> {
        match self {
            Outcome::Success => Some("success"),
            Outcome::Failure => Some("failure"),
            Outcome::SkippedEmptyLog | Outcome::SkippedNoCheckpoint => None,
        }
    }
}

/// Map a check result to an outcome. Pure and total: every (exit code,
/// output) pair maps to exactly one variant, first matching rule wins.
///
/// Success requires exit code 0 in addition to the marker, so a verifier that
/// printed the marker but still exited non-zero is treated as a failure.
pub fn classify(result: &CheckResult) -> Outcome {
    let output = format!("{}\n{}", result.stdout, result.stderr).to_lowercase();

    if result.exit_code == 0 && output.contains(VERIFIED_MARKER) {
        Outcome::Success
    } else if result.exit_code == 0 && output.contains(EMPTY_LOG_MARKER) {
        Outcome::SkippedEmptyLog
    } else if output.contains(NO_CHECKPOINT_MARKER) {
        Outcome::SkippedNoCheckpoint
    } else {
        Outcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stdout: &str, stderr: &str) -> CheckResult {
        CheckResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_verified_on_stderr_is_success() {
        let r = result(0, "", "Consistency Verified for checkpoint at index 42");
        assert_eq!(classify(&r), Outcome::Success);
    }

    #[test]
    fn test_verified_on_stdout_is_success() {
        let r = result(0, "consistency verified\n", "");
        assert_eq!(classify(&r), Outcome::Success);
    }

    #[test]
    fn test_verified_with_nonzero_exit_is_failure() {
        // Marker alone is not enough; success requires a clean exit
        let r = result(2, "", "Consistency Verified");
        assert_eq!(classify(&r), Outcome::Failure);
    }

    #[test]
    fn test_empty_log_is_skipped() {
        let r = result(
            0,
            "",
            "Error: consistency proofs can not be computed starting from an empty log",
        );
        assert_eq!(classify(&r), Outcome::SkippedEmptyLog);
    }

    #[test]
    fn test_empty_log_with_nonzero_exit_is_failure() {
        let r = result(
            1,
            "",
            "consistency proofs can not be computed starting from an empty log",
        );
        assert_eq!(classify(&r), Outcome::Failure);
    }

    #[test]
    fn test_no_checkpoint_is_skipped_regardless_of_exit_code() {
        let r = result(
            1,
            "",
            "no start index set and no log checkpoint found at path /data/checkpoint_log.txt",
        );
        assert_eq!(classify(&r), Outcome::SkippedNoCheckpoint);

        let r = result(0, "", "No start index set and no log checkpoint yet");
        assert_eq!(classify(&r), Outcome::SkippedNoCheckpoint);
    }

    #[test]
    fn test_unrecognized_output_is_failure() {
        let r = result(1, "", "connection refused");
        assert_eq!(classify(&r), Outcome::Failure);

        let r = result(0, "", "");
        assert_eq!(classify(&r), Outcome::Failure);
    }

    #[test]
    fn test_verified_wins_over_skip_markers() {
        // Priority order: rule 1 before rule 2 and 3
        let r = result(
            0,
            "consistency verified",
            "no start index set and no log checkpoint",
        );
        assert_eq!(classify(&r), Outcome::Success);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let r = result(0, "", "CONSISTENCY VERIFIED");
        assert_eq!(classify(&r), Outcome::Success);
    }

    #[test]
    fn test_classification_is_pure() {
        let r = result(0, "", "consistency verified");
        assert_eq!(classify(&r), classify(&r));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(Outcome::Success.status_label(), Some("success"));
        assert_eq!(Outcome::Failure.status_label(), Some("failure"));
        assert_eq!(Outcome::SkippedEmptyLog.status_label(), None);
        assert_eq!(Outcome::SkippedNoCheckpoint.status_label(), None);
    }
}
