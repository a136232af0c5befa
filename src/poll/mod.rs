//! Readiness backends for the bounded wait at the heart of each round.
//!
//! A backend arms a one-shot readiness watch on a descriptor ([`submit`])
//! and later suspends until the watch fires or a bound elapses ([`wait`]).
//! The production backend is [`UringPoller`]; [`LabPoller`] is a scripted
//! substitute for protocol tests.
//!
//! The contract both backends honor:
//!
//! - `submit` registers interest and returns a [`PollTicket`] proving a
//!   watch is outstanding. At most one watch is outstanding at a time.
//! - `wait` consumes the ticket and blocks the calling thread without
//!   spinning. It returns [`PollWait::Delivered`] when the watch fired and
//!   [`PollWait::TimedOut`] when the bound elapsed first. A notification
//!   that raced the bound counts as delivered.
//! - A backend that cannot run on the current kernel reports
//!   [`crate::ErrorKind::Unsupported`] rather than failing.
//!
//! [`submit`]: ReadinessPoller::submit
//! [`wait`]: ReadinessPoller::wait

mod lab;
mod uring;

pub use lab::{LabPoller, LabStep};
pub use uring::UringPoller;

use std::ops::{BitOr, BitOrAssign};
use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::Result;

/// Interest in I/O readiness events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Interest(u8);

impl Interest {
    /// No interest (empty set).
    pub const NONE: Self = Self(0);

    /// Interested in read readiness.
    pub const READABLE: Self = Self(1 << 0);

    /// Interested in write readiness.
    pub const WRITABLE: Self = Self(1 << 1);

    /// Interested in error conditions.
    pub const ERROR: Self = Self(1 << 2);

    /// Interested in hang-up (peer closed).
    pub const HUP: Self = Self(1 << 3);

    /// Get raw bits.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if interest contains all flags in other.
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if interest is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Check if readable interest is set.
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        (self.0 & Self::READABLE.0) != 0
    }

    /// Check if writable interest is set.
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        (self.0 & Self::WRITABLE.0) != 0
    }

    /// Combines interests by adding flags.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Interest {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut flags = Vec::new();
        if self.is_readable() {
            flags.push("READABLE");
        }
        if self.is_writable() {
            flags.push("WRITABLE");
        }
        if self.contains(Self::ERROR) {
            flags.push("ERROR");
        }
        if self.contains(Self::HUP) {
            flags.push("HUP");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join(" | "))
        }
    }
}

/// Proof that a readiness watch is outstanding.
///
/// Deliberately not `Copy` or `Clone`: [`ReadinessPoller::wait`] consumes
/// it, so a watch cannot be waited on twice.
#[derive(Debug, PartialEq, Eq)]
pub struct PollTicket(u64);

impl PollTicket {
    /// Creates a ticket carrying a backend-assigned token.
    #[must_use]
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// Token identifying the watch this ticket proves.
    #[must_use]
    pub const fn token(&self) -> u64 {
        self.0
    }
}

/// Readiness notification from a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ReadyEvent {
    /// Token of the watch that fired.
    pub token: u64,
    /// True if the descriptor is readable.
    pub readable: bool,
    /// True if the descriptor is writable.
    pub writable: bool,
    /// True if an error condition was raised.
    pub error: bool,
    /// True if the peer end hung up.
    pub hangup: bool,
}

impl ReadyEvent {
    /// Creates a readable event.
    #[must_use]
    pub const fn readable(token: u64) -> Self {
        Self {
            token,
            readable: true,
            writable: false,
            error: false,
            hangup: false,
        }
    }

    /// Creates an error event.
    #[must_use]
    pub const fn errored(token: u64) -> Self {
        Self {
            token,
            readable: false,
            writable: false,
            error: true,
            hangup: false,
        }
    }
}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollWait {
    /// The watch fired within the bound.
    Delivered(ReadyEvent),
    /// The bound elapsed with no notification.
    TimedOut,
}

impl PollWait {
    /// True if a notification arrived.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// A backend that arms one-shot readiness watches and waits on them.
pub trait ReadinessPoller: Send {
    /// Arms a one-shot watch for `interest` on `fd`.
    ///
    /// # Errors
    ///
    /// Fails if a watch is already outstanding or the backend rejected the
    /// registration.
    fn submit(&mut self, fd: RawFd, interest: Interest) -> Result<PollTicket>;

    /// Suspends until the watch behind `ticket` fires or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Fails if the backend wait itself failed; a timeout is not an error
    /// at this layer.
    fn wait(&mut self, ticket: PollTicket, timeout: Duration) -> Result<PollWait>;
}
