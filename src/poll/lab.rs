//! Scripted readiness poller for protocol tests.
//!
//! The lab poller resolves every wait instantly from a script, so driver
//! tests can exercise verdict handling (delivery, timeout, unsupported
//! kernels, backend faults) without a kernel dependency or wall-clock
//! timing. An exhausted script keeps delivering, which makes happy-path
//! runs of any length trivial to set up.

use std::collections::VecDeque;
use std::io;
use std::os::fd::RawFd;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use super::{Interest, PollTicket, PollWait, ReadinessPoller, ReadyEvent};
use crate::error::{Error, Result};

/// One scripted round outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabStep {
    /// The wait resolves with a readable notification.
    Deliver,
    /// The wait reports an elapsed bound with no notification.
    Timeout,
    /// The submission is rejected the way an incapable kernel would.
    Unsupported,
    /// The submission fails with a backend fault.
    SubmitError,
    /// The wait fails with a backend fault.
    WaitError,
}

#[derive(Debug, Default)]
struct LabState {
    script: VecDeque<LabStep>,
    next_token: u64,
    outstanding: Option<(u64, LabStep)>,
    submissions: u64,
    delivered: u64,
    timeouts: u64,
}

/// Scripted in-memory poller.
///
/// Clones share one script and counter set, so a test can keep a handle on
/// the counters while the driver consumes the poller itself.
#[derive(Debug, Default, Clone)]
pub struct LabPoller {
    state: Arc<StdMutex<LabState>>,
}

impl LabPoller {
    /// Creates a poller whose every round delivers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a poller that plays `steps` in order, then keeps delivering.
    #[must_use]
    pub fn scripted(steps: impl IntoIterator<Item = LabStep>) -> Self {
        let poller = Self::new();
        poller
            .state
            .lock()
            .expect("lab poller lock poisoned")
            .script
            .extend(steps);
        poller
    }

    /// Appends a step to the script.
    pub fn push_step(&self, step: LabStep) {
        self.state
            .lock()
            .expect("lab poller lock poisoned")
            .script
            .push_back(step);
    }

    /// Number of watches accepted so far.
    #[must_use]
    pub fn submissions(&self) -> u64 {
        self.state.lock().expect("lab poller lock poisoned").submissions
    }

    /// Number of waits resolved by delivery.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.state.lock().expect("lab poller lock poisoned").delivered
    }

    /// Number of waits resolved by an elapsed bound.
    #[must_use]
    pub fn timeouts(&self) -> u64 {
        self.state.lock().expect("lab poller lock poisoned").timeouts
    }
}

impl ReadinessPoller for LabPoller {
    fn submit(&mut self, _fd: RawFd, _interest: Interest) -> Result<PollTicket> {
        let mut state = self.state.lock().expect("lab poller lock poisoned");
        if let Some((token, _)) = state.outstanding {
            return Err(Error::internal(format!(
                "readiness watch {token} is still outstanding"
            )));
        }
        let step = state.script.pop_front().unwrap_or(LabStep::Deliver);
        match step {
            LabStep::Unsupported => {
                return Err(Error::unsupported(
                    "scripted kernel without readiness polling",
                ))
            }
            LabStep::SubmitError => {
                return Err(Error::poll_backend(
                    "scripted submission fault",
                    io::Error::new(io::ErrorKind::Other, "scripted fault"),
                ))
            }
            LabStep::Deliver | LabStep::Timeout | LabStep::WaitError => {}
        }
        state.submissions += 1;
        let token = state.next_token;
        state.next_token += 1;
        state.outstanding = Some((token, step));
        Ok(PollTicket::new(token))
    }

    fn wait(&mut self, ticket: PollTicket, _timeout: Duration) -> Result<PollWait> {
        let mut state = self.state.lock().expect("lab poller lock poisoned");
        let Some((token, step)) = state.outstanding.take() else {
            return Err(Error::internal("wait without an outstanding watch"));
        };
        if token != ticket.token() {
            return Err(Error::internal(format!(
                "wait for unknown readiness watch {}",
                ticket.token()
            )));
        }
        match step {
            LabStep::Deliver => {
                state.delivered += 1;
                Ok(PollWait::Delivered(ReadyEvent::readable(token)))
            }
            LabStep::Timeout => {
                state.timeouts += 1;
                Ok(PollWait::TimedOut)
            }
            LabStep::WaitError => Err(Error::poll_backend(
                "scripted wait fault",
                io::Error::new(io::ErrorKind::Other, "scripted fault"),
            )),
            LabStep::Unsupported | LabStep::SubmitError => Err(Error::internal(
                "submission-phase step reached the wait phase",
            )),
        }
    }
}
