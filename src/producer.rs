//! The two producers racing over the channel.
//!
//! Between the start and end gates of a round the producers interleave
//! freely; only the gate states are fixed. The channel is empty at every
//! start gate, and exactly one byte is present at every end gate: the
//! direct producer adds one, the drain-refill producer removes one and
//! adds one back.
//!
//! A producer that faults keeps its error, asks everyone to stop, and
//! still crosses the end gate, so the other parties are never stranded
//! waiting for it.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};
use crate::state::RaceState;

/// Distinguishes the two producer behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerRole {
    /// Splices the reservoir byte straight into the channel.
    Direct,
    /// Consumes the byte present (waiting for it if needed), then splices
    /// a replacement.
    DrainRefill,
}

impl ProducerRole {
    /// Stable name used for thread naming and log fields.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "producer-a",
            Self::DrainRefill => "producer-b",
        }
    }
}

/// One producer party of a race instance.
#[derive(Debug)]
pub struct Producer {
    role: ProducerRole,
    shared: Arc<RaceState>,
}

impl Producer {
    /// Creates a producer over the shared race state.
    #[must_use]
    pub fn new(role: ProducerRole, shared: Arc<RaceState>) -> Self {
        Self { role, shared }
    }

    /// Runs rounds until a stop is requested, returning the first fault
    /// this producer hit.
    pub fn run(self) -> Result<()> {
        let mut fault: Option<Error> = None;
        loop {
            self.shared.cross_gate();
            if self.shared.stop_requested() {
                break;
            }
            if let Err(err) = self.step() {
                tracing::debug!(role = self.role.as_str(), error = %err, "producer step failed");
                self.shared.request_stop();
                fault = Some(err);
            }
            self.shared.cross_gate();
        }
        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn step(&self) -> Result<()> {
        match self.role {
            ProducerRole::Direct => self.shared.transfer_byte(),
            ProducerRole::DrainRefill => {
                self.shared.consume_byte()?;
                self.shared.transfer_byte()
            }
        }
    }
}

/// Spawns a named producer thread.
pub fn spawn(role: ProducerRole, shared: Arc<RaceState>) -> io::Result<JoinHandle<Result<()>>> {
    thread::Builder::new()
        .name(role.as_str().to_string())
        .spawn(move || Producer::new(role, shared).run())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::ByteChannel;
    use crate::error::ErrorKind;
    use crate::reservoir::{ByteReservoir, ReservoirHandle, RESERVOIR_BYTE};

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    fn spawn_pair(shared: &Arc<RaceState>) -> Vec<JoinHandle<Result<()>>> {
        vec![
            spawn(ProducerRole::Direct, Arc::clone(shared)).expect("spawn producer-a"),
            spawn(ProducerRole::DrainRefill, Arc::clone(shared)).expect("spawn producer-b"),
        ]
    }

    #[test]
    fn one_round_leaves_exactly_one_byte_at_the_end_gate() {
        init_test("one_round_leaves_exactly_one_byte_at_the_end_gate");
        let reservoir = ByteReservoir::create().expect("create reservoir");
        let handle = reservoir.handle().expect("open handle");
        let channel = ByteChannel::new().expect("create channel");
        let shared = Arc::new(RaceState::new(channel, handle, Duration::from_secs(1)));
        let producers = spawn_pair(&shared);

        shared.cross_gate();
        shared.cross_gate();

        let byte = shared.consume_byte().expect("one byte owed after the end gate");
        crate::assert_with_log!(byte == RESERVOIR_BYTE, "byte value", RESERVOIR_BYTE, byte);
        let pending = shared.channel().has_pending().expect("probe");
        crate::assert_with_log!(!pending, "channel empty after drain", false, pending);

        shared.request_stop();
        shared.cross_gate();
        for producer in producers {
            producer
                .join()
                .expect("producer thread panicked")
                .expect("clean round must not fault");
        }
        crate::test_complete!("one_round_leaves_exactly_one_byte_at_the_end_gate");
    }

    #[test]
    fn empty_reservoir_faults_both_producers_and_stops_the_run() {
        init_test("empty_reservoir_faults_both_producers_and_stops_the_run");
        let empty = tempfile::NamedTempFile::new().expect("create empty file");
        let handle = ReservoirHandle::open(empty.path()).expect("open handle");
        let channel = ByteChannel::new().expect("create channel");
        let shared = Arc::new(RaceState::new(channel, handle, Duration::from_millis(100)));
        let producers = spawn_pair(&shared);

        shared.cross_gate();
        shared.cross_gate();
        crate::assert_with_log!(
            shared.stop_requested(),
            "faults raise the stop flag",
            true,
            shared.stop_requested()
        );

        shared.cross_gate();
        for producer in producers {
            let err = producer
                .join()
                .expect("producer thread panicked")
                .expect_err("no byte can move out of an empty reservoir");
            let kind = err.kind();
            crate::assert_with_log!(
                kind == ErrorKind::ChannelIo,
                "fault kind",
                ErrorKind::ChannelIo,
                kind
            );
        }
        crate::test_complete!("empty_reservoir_faults_both_producers_and_stops_the_run");
    }
}
