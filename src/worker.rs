//! Assembles and runs one race instance end to end.
//!
//! A worker owns everything its instance needs: a private channel, a
//! read-only reservoir handle, the shared state, two producer threads, and
//! the driver. Replicated runs call [`run_to_exit_code`] once per child
//! process; single-process runs and tests call [`run`] or
//! [`run_with_poller`] directly.

use std::path::Path;
use std::sync::Arc;

use crate::channel::ByteChannel;
use crate::config::HarnessConfig;
use crate::driver::{Driver, RoundsReport};
use crate::error::{Error, Result};
use crate::exit::ExitCode;
use crate::poll::{ReadinessPoller, UringPoller};
use crate::producer::{self, ProducerRole};
use crate::reservoir::ReservoirHandle;
use crate::state::RaceState;

/// Runs one instance with the production poller.
///
/// # Errors
///
/// Skips (via [`crate::ErrorKind::Unsupported`]) when the kernel cannot
/// back the poller; otherwise fails with the underlying error.
pub fn run(config: &HarnessConfig, reservoir: &Path) -> Result<RoundsReport> {
    let poller = UringPoller::new()?;
    run_with_poller(config, poller, reservoir)
}

/// Runs one instance over any poller backend.
pub fn run_with_poller<P: ReadinessPoller>(
    config: &HarnessConfig,
    poller: P,
    reservoir: &Path,
) -> Result<RoundsReport> {
    let handle = ReservoirHandle::open(reservoir)?;
    let channel = ByteChannel::new()?;
    let shared = Arc::new(RaceState::new(channel, handle, config.wait_timeout));

    let first = producer::spawn(ProducerRole::Direct, Arc::clone(&shared))
        .map_err(|err| Error::setup("spawning producer-a", err))?;
    let second = match producer::spawn(ProducerRole::DrainRefill, Arc::clone(&shared)) {
        Ok(handle) => handle,
        Err(err) => {
            // Two parties cannot form the three-way gate, so there is no
            // handshake to run here. The already-spawned producer stays
            // parked at its first gate and dies with the exiting process.
            return Err(Error::setup("spawning producer-b", err));
        }
    };

    let driver = Driver::new(
        shared,
        poller,
        config.rounds,
        config.wait_timeout,
        vec![first, second],
    );
    driver.run()
}

/// Runs one instance and folds the outcome into a process exit code.
///
/// This is the single place outcomes become exit codes; callers exit
/// exactly once with the returned value.
#[must_use]
pub fn run_to_exit_code(config: &HarnessConfig, reservoir: &Path) -> i32 {
    match run(config, reservoir) {
        Ok(report) => {
            tracing::info!(rounds = report.rounds, elapsed = ?report.elapsed, "all rounds clean");
            ExitCode::SUCCESS
        }
        Err(err) if err.is_skip() => {
            tracing::warn!(error = %err, "environment cannot run the race; skipping");
            err.exit_code()
        }
        Err(err) => {
            tracing::error!(error = %err, "run failed");
            err.exit_code()
        }
    }
}
