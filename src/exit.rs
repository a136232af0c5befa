//! Semantic exit codes for the harness.
//!
//! Codes stay in the shell-safe range (0-125) except for the conventional
//! 128+signo mapping applied to signal-terminated workers during
//! aggregation.

/// Semantic exit codes.
///
/// These provide machine-readable status for scripts driving the harness.
pub struct ExitCode;

impl ExitCode {
    /// Success - every worker completed all rounds without a violation.
    pub const SUCCESS: i32 = 0;

    /// Failure - setup or runtime error, or the lost-wakeup violation.
    pub const FAILURE: i32 = 1;

    /// Skipped - the environment lacks the readiness facility under test.
    pub const SKIPPED: i32 = 3;

    /// Base for mapping signal-terminated workers (128 + signal number).
    pub const SIGNAL_BASE: i32 = 128;

    /// Get a human-readable description of an exit code.
    #[must_use]
    pub const fn description(code: i32) -> &'static str {
        match code {
            0 => "success",
            1 => "harness failure or lost wakeup detected",
            3 => "skipped (readiness facility unavailable)",
            c if c > Self::SIGNAL_BASE => "worker terminated by signal",
            _ => "unknown",
        }
    }

    /// Check if an exit code indicates success (code 0).
    #[must_use]
    pub const fn is_success(code: i32) -> bool {
        code == Self::SUCCESS
    }

    /// Check if an exit code is the skip marker.
    #[must_use]
    pub const fn is_skip(code: i32) -> bool {
        code == Self::SKIPPED
    }

    /// Check if an exit code indicates a hard failure (non-zero, non-skip).
    #[must_use]
    pub const fn is_failure(code: i32) -> bool {
        code != Self::SUCCESS && code != Self::SKIPPED
    }

    /// Map a terminating signal number to an exit code.
    #[must_use]
    pub const fn from_signal(signal: i32) -> i32 {
        Self::SIGNAL_BASE + signal
    }
}
