//! Harness configuration with sensible defaults and validation.
//!
//! The defaults reproduce the classic shape of the measurement: 5000 rounds
//! per worker, a 5 second completion bound, and one worker per available
//! processing unit. The completion bound is a scheduling heuristic, not a
//! semantic contract, so it is a tunable rather than a constant.

use std::time::Duration;

/// Default number of rounds each worker drives.
pub const DEFAULT_ROUNDS: u32 = 5000;

/// Default upper bound on each round's completion wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Smallest accepted completion bound. Anything shorter reports ordinary
/// scheduler latency as a lost wakeup.
pub const MIN_WAIT_TIMEOUT: Duration = Duration::from_millis(10);

/// Top-level harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Rounds each worker drives before exiting cleanly.
    pub rounds: u32,
    /// Upper bound on each round's completion wait; exceeding it is the
    /// violation verdict.
    pub wait_timeout: Duration,
    /// Worker process count override. `None` uses available parallelism.
    pub workers: Option<usize>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            workers: None,
        }
    }
}

impl HarnessConfig {
    /// Sets the number of rounds each worker drives.
    #[must_use]
    pub fn rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the completion wait bound.
    #[must_use]
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Sets the worker process count. `None` uses available parallelism.
    #[must_use]
    pub fn workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    /// Resolves the worker count, falling back to available parallelism.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        match self.workers {
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1),
        }
    }

    /// Validates the configuration for basic sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if self.wait_timeout < MIN_WAIT_TIMEOUT {
            return Err(ConfigError::TimeoutTooShort);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Round count must be at least 1.
    ZeroRounds,
    /// Completion bound below the accepted floor.
    TimeoutTooShort,
    /// Worker override must be at least 1.
    ZeroWorkers,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroRounds => write!(f, "rounds must be >= 1"),
            Self::TimeoutTooShort => {
                write!(f, "wait timeout must be >= {}ms", MIN_WAIT_TIMEOUT.as_millis())
            }
            Self::ZeroWorkers => write!(f, "workers must be >= 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        crate::error::Error::new(crate::error::ErrorKind::Config).with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn defaults_validate() {
        init_test("defaults_validate");
        let config = HarnessConfig::default();
        let ok = config.validate().is_ok();
        crate::assert_with_log!(ok, "defaults valid", true, ok);
        crate::assert_with_log!(config.rounds == 5000, "default rounds", 5000, config.rounds);
        crate::assert_with_log!(
            config.wait_timeout == Duration::from_secs(5),
            "default timeout",
            Duration::from_secs(5),
            config.wait_timeout
        );
        crate::test_complete!("defaults_validate");
    }

    #[test]
    fn zero_rounds_rejected() {
        init_test("zero_rounds_rejected");
        let err = HarnessConfig::default().rounds(0).validate().unwrap_err();
        crate::assert_with_log!(err == ConfigError::ZeroRounds, "zero rounds", ConfigError::ZeroRounds, err);
        crate::test_complete!("zero_rounds_rejected");
    }

    #[test]
    fn degenerate_timeout_rejected() {
        init_test("degenerate_timeout_rejected");
        let err = HarnessConfig::default()
            .wait_timeout(Duration::from_millis(1))
            .validate()
            .unwrap_err();
        crate::assert_with_log!(
            err == ConfigError::TimeoutTooShort,
            "short timeout",
            ConfigError::TimeoutTooShort,
            err
        );
        let ok = HarnessConfig::default()
            .wait_timeout(MIN_WAIT_TIMEOUT)
            .validate()
            .is_ok();
        crate::assert_with_log!(ok, "floor accepted", true, ok);
        crate::test_complete!("degenerate_timeout_rejected");
    }

    #[test]
    fn zero_workers_rejected_none_resolves() {
        init_test("zero_workers_rejected_none_resolves");
        let err = HarnessConfig::default()
            .workers(Some(0))
            .validate()
            .unwrap_err();
        crate::assert_with_log!(err == ConfigError::ZeroWorkers, "zero workers", ConfigError::ZeroWorkers, err);

        let pinned = HarnessConfig::default().workers(Some(2));
        crate::assert_with_log!(pinned.effective_workers() == 2, "pinned workers", 2, pinned.effective_workers());

        let derived = HarnessConfig::default().effective_workers();
        crate::assert_with_log!(derived >= 1, "derived workers", ">= 1", derived);
        crate::test_complete!("zero_workers_rejected_none_resolves");
    }

    #[test]
    fn config_error_converts_to_harness_error() {
        init_test("config_error_converts_to_harness_error");
        let err: crate::error::Error = ConfigError::ZeroRounds.into();
        let kind = err.kind();
        crate::assert_with_log!(
            kind == crate::error::ErrorKind::Config,
            "config kind",
            crate::error::ErrorKind::Config,
            kind
        );
        crate::test_complete!("config_error_converts_to_harness_error");
    }
}
