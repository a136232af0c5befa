//! Drives the rounds of one race instance.
//!
//! Per round the driver arms a readiness watch on the channel, releases
//! both producers through the start gate, waits (suspended) for the
//! notification, meets the producers at the end gate, and drains the byte
//! the round owes. A wait that outlives its bound while the producers are
//! healthy is the defect this harness exists to catch: the watch was armed
//! before any byte moved, so the notification must arrive.
//!
//! Every exit path funnels through one shutdown handshake: raise the stop
//! flag, cross one gate to release the parked producers, join them. The
//! gate arithmetic relies on producers always parking at a start gate,
//! which the producer loop guarantees by crossing its end gate even after
//! a fault.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{Error, ErrorKind, Result};
use crate::poll::{Interest, PollWait, ReadinessPoller};
use crate::state::RaceState;

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundsReport {
    /// Rounds fully completed.
    pub rounds: u32,
    /// Wall-clock time the run took.
    pub elapsed: Duration,
}

/// How a single round resolved, before error precedence is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundStatus {
    Completed,
    ProducerFault,
}

/// The driver party of a race instance.
#[derive(Debug)]
pub struct Driver<P: ReadinessPoller> {
    shared: Arc<RaceState>,
    poller: P,
    rounds: u32,
    wait_timeout: Duration,
    producers: Vec<JoinHandle<Result<()>>>,
}

impl<P: ReadinessPoller> Driver<P> {
    /// Builds the driver over already-spawned producers.
    #[must_use]
    pub fn new(
        shared: Arc<RaceState>,
        poller: P,
        rounds: u32,
        wait_timeout: Duration,
        producers: Vec<JoinHandle<Result<()>>>,
    ) -> Self {
        Self {
            shared,
            poller,
            rounds,
            wait_timeout,
            producers,
        }
    }

    /// Runs the configured number of rounds and tears the instance down.
    ///
    /// # Errors
    ///
    /// A producer fault outranks the driver's own verdict: a missing byte
    /// explains a missing notification, so reporting the timeout would
    /// blame the kernel for a userspace failure. When the producers are
    /// clean, a timed-out wait surfaces as [`ErrorKind::WakeupLost`].
    pub fn run(mut self) -> Result<RoundsReport> {
        tracing::debug!(
            rounds = self.rounds,
            timeout = ?self.wait_timeout,
            "driving race rounds"
        );
        let started = Instant::now();
        let mut completed: u32 = 0;
        let mut failure: Option<Error> = None;

        for round in 0..self.rounds {
            match self.run_round(round) {
                Ok(RoundStatus::Completed) => completed += 1,
                Ok(RoundStatus::ProducerFault) => break,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        self.shared.request_stop();
        self.shared.cross_gate();
        let producers = self.join_producers();

        if let Err(err) = producers {
            return Err(err);
        }
        if let Some(err) = failure {
            return Err(err);
        }
        let report = RoundsReport {
            rounds: completed,
            elapsed: started.elapsed(),
        };
        tracing::debug!(rounds = report.rounds, elapsed = ?report.elapsed, "run complete");
        Ok(report)
    }

    fn run_round(&mut self, round: u32) -> Result<RoundStatus> {
        // Arm before the start gate: the watch must be outstanding before
        // any producer can touch the channel. A failed submission leaves
        // the round with no gates crossed, which the shutdown handshake
        // expects.
        let ticket = self
            .poller
            .submit(self.shared.channel().read_fd(), Interest::READABLE)?;

        self.shared.cross_gate();
        let wait = self.poller.wait(ticket, self.wait_timeout);
        self.shared.cross_gate();

        if self.shared.stop_requested() {
            // A producer faulted mid-round. Its error is the root cause;
            // whatever the wait returned for this round is meaningless.
            tracing::debug!(round, "round abandoned after producer fault");
            return Ok(RoundStatus::ProducerFault);
        }

        match wait? {
            PollWait::Delivered(event) => {
                if !event.readable {
                    tracing::warn!(round, ?event, "notification arrived without readable flag");
                }
            }
            PollWait::TimedOut => {
                let byte_present = self.shared.channel().has_pending().unwrap_or(false);
                return Err(Error::new(ErrorKind::WakeupLost).with_message(format!(
                    "round {round}: no readiness notification within {:?} (byte present: {byte_present})",
                    self.wait_timeout
                )));
            }
        }

        // Drain the byte owed at the end gate so the next round starts
        // with an empty channel.
        let byte = self.shared.consume_byte()?;
        tracing::trace!(round, byte, "round complete");
        Ok(RoundStatus::Completed)
    }

    fn join_producers(&mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        for handle in self.producers.drain(..) {
            let outcome = match handle.join() {
                Ok(result) => result,
                Err(_) => Err(Error::internal("producer thread panicked")),
            };
            if let Err(err) = outcome {
                tracing::debug!(error = %err, "producer finished with fault");
                if first.is_none() {
                    first = Some(err);
                }
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
