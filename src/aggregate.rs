//! Aggregation of replica outcomes into one controller verdict.
//!
//! The controller never averages away a failure: one replica reproducing
//! the lost wakeup fails the whole run regardless of how many siblings
//! passed, and a run in which nothing actually measured (every replica
//! skipped, or none ran) can never report success.

use crate::exit::ExitCode;
use crate::replicate::WorkerExit;

/// Tallied outcome of a replicated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Replicas observed in total.
    pub total: usize,
    /// Replicas that completed every round cleanly.
    pub succeeded: usize,
    /// Replicas that skipped for lack of kernel support.
    pub skipped: usize,
    /// Worst failure code seen, if any replica failed.
    pub worst_failure: Option<i32>,
}

/// Tallies replica exits. Signal terminations count as failures with the
/// conventional 128+signal code.
#[must_use]
pub fn summarize(exits: &[WorkerExit]) -> RunSummary {
    let mut summary = RunSummary {
        total: exits.len(),
        succeeded: 0,
        skipped: 0,
        worst_failure: None,
    };
    for exit in exits {
        let code = exit.status.code();
        if code == ExitCode::SUCCESS {
            summary.succeeded += 1;
        } else if code == ExitCode::SKIPPED {
            summary.skipped += 1;
        } else {
            summary.worst_failure =
                Some(summary.worst_failure.map_or(code, |worst| worst.max(code)));
        }
    }
    summary
}

impl RunSummary {
    /// Folds the tally into the controller's exit code.
    ///
    /// Any failure wins, and the numerically worst one is reported. With
    /// no failures, at least one replica must have measured for the run
    /// to pass; all-skipped runs report the skip code, and an empty run
    /// is a failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.worst_failure {
            return code;
        }
        if self.total == 0 {
            return ExitCode::FAILURE;
        }
        if self.succeeded == 0 {
            return ExitCode::SKIPPED;
        }
        ExitCode::SUCCESS
    }
}
