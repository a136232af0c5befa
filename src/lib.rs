//! Deterministic reproduction harness for lost-wakeup races in readiness
//! polling.
//!
//! The harness rebuilds a narrow race that production runtimes hit rarely
//! and CI almost never: a one-shot readiness watch on a pipe is submitted
//! while two producers replace the pipe's contents in lockstep, and a
//! kernel (or reactor) with the bug fails to deliver the notification even
//! though a byte is sitting in the pipe. Every round is forced through the
//! same interleaving with a three-way [`barrier::PhaseBarrier`], so a
//! single process reproduces in seconds what load testing finds in weeks.
//!
//! # Actors
//!
//! Each instance wires three threads around shared [`state::RaceState`]:
//!
//! * the driver submits the readiness watch and waits on it
//!   ([`driver::Driver`]),
//! * one producer splices the reservoir byte straight into the channel
//!   ([`producer::ProducerRole::Direct`]),
//! * one producer drains the channel first and then refills it
//!   ([`producer::ProducerRole::DrainRefill`]).
//!
//! The drain-then-refill producer is the race: readiness for the drained
//! byte is consumed, and the refill must re-arm it. A missed wakeup
//! surfaces as the driver timing out with a byte demonstrably present.
//!
//! # Verdicts
//!
//! A full run forks one instance per CPU ([`replicate`]) and folds the
//! replica exits into a single verdict ([`aggregate`]): any reproduction
//! fails the run, kernels without io_uring poll support skip rather than
//! pass, and a run in which no replica measured never reports success.
//!
//! ```
//! use lostwake::config::HarnessConfig;
//! use lostwake::poll::LabPoller;
//! use lostwake::reservoir::ByteReservoir;
//! use lostwake::worker;
//! use std::time::Duration;
//!
//! let config = HarnessConfig::default()
//!     .rounds(3)
//!     .wait_timeout(Duration::from_secs(1));
//! let reservoir = ByteReservoir::create().expect("reservoir");
//! let report = worker::run_with_poller(&config, LabPoller::new(), reservoir.path())
//!     .expect("scripted run");
//! assert_eq!(report.rounds, 3);
//! ```

#![deny(unsafe_code)]

pub mod aggregate;
pub mod barrier;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod exit;
pub mod poll;
pub mod producer;
pub mod replicate;
pub mod reservoir;
pub mod state;
pub mod worker;

pub use config::HarnessConfig;
pub use error::{Error, ErrorKind, Result};
pub use exit::ExitCode;

/// Phase tracking macro for structured test logging.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Completion marker macro for structured test logging.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST COMPLETE ===");
    };
}

/// Assertion with logging for better test output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

#[cfg(test)]
mod test_utils;
