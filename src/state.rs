//! Shared state for one race instance.
//!
//! Everything the three parties touch concurrently is owned by a single
//! [`RaceState`] value behind an `Arc`, so independent instances (tests,
//! replicas, repeated runs in one process) never interfere with each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::barrier::{BarrierWaitResult, PhaseBarrier};
use crate::channel::ByteChannel;
use crate::error::Result;
use crate::reservoir::ReservoirHandle;

/// Parties meeting at each gate: two producers and the driver.
pub const RACE_PARTIES: usize = 3;

/// Shared state of one running race instance.
#[derive(Debug)]
pub struct RaceState {
    channel: ByteChannel,
    reservoir: ReservoirHandle,
    barrier: PhaseBarrier,
    stop: AtomicBool,
    consume_timeout: Duration,
}

impl RaceState {
    /// Builds the shared state around an open channel and reservoir handle.
    ///
    /// `consume_timeout` bounds every blocking consume so that a failed
    /// sibling party surfaces as an error instead of a wedge.
    #[must_use]
    pub fn new(
        channel: ByteChannel,
        reservoir: ReservoirHandle,
        consume_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            reservoir,
            barrier: PhaseBarrier::new(RACE_PARTIES),
            stop: AtomicBool::new(false),
            consume_timeout,
        }
    }

    /// The channel the race runs over.
    #[must_use]
    pub fn channel(&self) -> &ByteChannel {
        &self.channel
    }

    /// Blocks until all three parties arrive, then releases them together.
    pub fn cross_gate(&self) -> BarrierWaitResult {
        self.barrier.wait()
    }

    /// Asks every party to wind down after its current gate.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// True once any party has requested a stop.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Splices the reservoir byte into the channel.
    pub fn transfer_byte(&self) -> Result<()> {
        self.reservoir.transfer_into(&self.channel)
    }

    /// Consumes one byte from the channel, bounded by the consume timeout.
    pub fn consume_byte(&self) -> Result<u8> {
        self.channel.consume_byte(self.consume_timeout)
    }
}
