//! io_uring-backed readiness poller (Linux only).
//!
//! Arms a one-shot `PollAdd` on the watched descriptor and waits for its
//! completion with a kernel-timed submit, so the waiting thread is truly
//! suspended between submit and completion. The one-shot semantics match
//! the protocol exactly: one watch per round, never re-armed.
//!
//! NOTE: This module uses unsafe to submit SQEs. The safety invariants are
//! documented inline.

#[cfg(target_os = "linux")]
mod imp {
    #![allow(unsafe_code)]
    #![allow(clippy::cast_sign_loss)]

    use super::super::{Interest, PollTicket, PollWait, ReadinessPoller, ReadyEvent};
    use crate::error::{Error, Result};
    use io_uring::{opcode, types, IoUring, Probe};
    use std::io;
    use std::os::fd::RawFd;
    use std::time::{Duration, Instant};

    // One watch is outstanding at a time, so a small ring is plenty.
    const RING_ENTRIES: u32 = 8;

    /// io_uring-backed readiness poller.
    pub struct UringPoller {
        ring: IoUring,
        next_token: u64,
        in_flight: Option<u64>,
    }

    impl std::fmt::Debug for UringPoller {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("UringPoller")
                .field("next_token", &self.next_token)
                .field("in_flight", &self.in_flight)
                .finish_non_exhaustive()
        }
    }

    impl UringPoller {
        /// Creates the poller, probing the kernel for `PollAdd` support.
        ///
        /// # Errors
        ///
        /// Returns [`crate::ErrorKind::Unsupported`] when the kernel lacks
        /// io_uring or its poll opcode, and a setup error for anything else.
        pub fn new() -> Result<Self> {
            let ring = IoUring::new(RING_ENTRIES).map_err(ring_unavailable)?;

            // Old kernels accept ring creation but lack the poll opcode. A
            // probe registration failure alone proves nothing and is
            // tolerated; an explicit "not supported" answer is conclusive.
            let mut probe = Probe::new();
            if ring.submitter().register_probe(&mut probe).is_ok()
                && !probe.is_supported(opcode::PollAdd::CODE)
            {
                return Err(Error::unsupported(
                    "kernel io_uring does not support the poll opcode",
                ));
            }

            Ok(Self {
                ring,
                next_token: 0,
                in_flight: None,
            })
        }
    }

    impl ReadinessPoller for UringPoller {
        fn submit(&mut self, fd: RawFd, interest: Interest) -> Result<PollTicket> {
            if let Some(token) = self.in_flight {
                return Err(Error::internal(format!(
                    "readiness watch {token} is still outstanding"
                )));
            }

            let token = self.next_token;
            self.next_token = self.next_token.wrapping_add(1);

            let mask = interest_to_poll_mask(interest);
            let entry = opcode::PollAdd::new(types::Fd(fd), mask)
                .build()
                .user_data(token);

            // SAFETY: PollAdd only uses the fd and interest mask; both remain
            // valid for the duration of the poll request (caller ensures fd
            // lifetime).
            unsafe {
                self.ring
                    .submission()
                    .push(&entry)
                    .map_err(|_| Error::internal("submission queue full with one watch"))?;
            }
            self.ring
                .submit()
                .map_err(|err| classify_ring_error("submitting readiness watch", err))?;

            self.in_flight = Some(token);
            Ok(PollTicket::new(token))
        }

        fn wait(&mut self, ticket: PollTicket, timeout: Duration) -> Result<PollWait> {
            let token = ticket.token();
            if self.in_flight != Some(token) {
                return Err(Error::internal(format!(
                    "wait for unknown readiness watch {token}"
                )));
            }

            let deadline = Instant::now() + timeout;
            let mut timed_out = false;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    timed_out = true;
                    break;
                }
                let ts = types::Timespec::new()
                    .sec(remaining.as_secs())
                    .nsec(remaining.subsec_nanos());
                let args = types::SubmitArgs::new().timespec(&ts);
                match self.ring.submitter().submit_with_args(1, &args) {
                    Ok(_) => break,
                    Err(err) if err.raw_os_error() == Some(libc::ETIME) => {
                        timed_out = true;
                        break;
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                    Err(err) => {
                        return Err(classify_ring_error("waiting for readiness watch", err))
                    }
                }
            }

            // Harvest the completion queue even after a timed-out wait: a
            // completion that raced the timer still counts as delivered.
            let mut outcome = None;
            for cqe in self.ring.completion() {
                if cqe.user_data() == token {
                    outcome = Some(cqe.result());
                }
            }

            match outcome {
                Some(res) if res < 0 => {
                    self.in_flight = None;
                    Err(completion_error(-res))
                }
                Some(res) => {
                    self.in_flight = None;
                    Ok(PollWait::Delivered(mask_to_event(token, res as u32)))
                }
                // The watch stays armed in the kernel, so it stays tracked
                // here and a fresh submit is refused.
                None if timed_out => Ok(PollWait::TimedOut),
                None => Err(Error::internal(
                    "readiness wait returned without completion or timeout",
                )),
            }
        }
    }

    fn interest_to_poll_mask(interest: Interest) -> u32 {
        let mut mask = 0u32;
        if interest.is_readable() {
            mask |= libc::POLLIN as u32;
        }
        if interest.is_writable() {
            mask |= libc::POLLOUT as u32;
        }
        if interest.contains(Interest::ERROR) {
            mask |= libc::POLLERR as u32;
        }
        if interest.contains(Interest::HUP) {
            mask |= libc::POLLHUP as u32;
        }
        mask
    }

    fn mask_to_event(token: u64, mask: u32) -> ReadyEvent {
        ReadyEvent {
            token,
            readable: (mask & libc::POLLIN as u32) != 0,
            writable: (mask & libc::POLLOUT as u32) != 0,
            error: (mask & libc::POLLERR as u32) != 0,
            hangup: (mask & libc::POLLHUP as u32) != 0,
        }
    }

    /// Classifies an `IoUring::new` failure: kernels without io_uring (or
    /// with it locked down) are a skip, everything else is a setup fault.
    fn ring_unavailable(err: io::Error) -> Error {
        let locked_out = matches!(err.raw_os_error(), Some(libc::ENOSYS | libc::EPERM))
            || matches!(
                err.kind(),
                io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied
            );
        if locked_out {
            Error::unsupported("io_uring is unavailable on this kernel").with_source(err)
        } else {
            Error::setup("creating io_uring", err)
        }
    }

    /// Classifies submit/wait syscall failures. EINVAL covers kernels that
    /// predate the timed-wait extension.
    fn classify_ring_error(what: &'static str, err: io::Error) -> Error {
        match err.raw_os_error() {
            Some(libc::ENOSYS | libc::EOPNOTSUPP | libc::EINVAL) => {
                Error::unsupported(format!("{what}: rejected by kernel")).with_source(err)
            }
            _ => Error::poll_backend(what, err),
        }
    }

    /// Classifies a negative completion result (`-errno`).
    fn completion_error(errno: i32) -> Error {
        let err = io::Error::from_raw_os_error(errno);
        match errno {
            libc::ENOSYS | libc::EOPNOTSUPP | libc::EINVAL => {
                Error::unsupported("poll completion rejected by kernel").with_source(err)
            }
            _ => Error::poll_backend("poll completion failed", err),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::channel::ByteChannel;
        use crate::error::ErrorKind;

        fn init_test(name: &str) {
            crate::test_utils::init_test_logging();
            crate::test_phase!(name);
        }

        fn new_or_skip() -> Option<UringPoller> {
            match UringPoller::new() {
                Ok(poller) => Some(poller),
                Err(err) => {
                    assert!(
                        err.is_skip() || err.kind() == ErrorKind::Setup,
                        "unexpected io_uring error: {err}"
                    );
                    None
                }
            }
        }

        fn write_one(channel: &ByteChannel) {
            let buf = [0x5au8];
            // SAFETY: fd is a valid open pipe write end and buf outlives the
            // call.
            let n = unsafe {
                libc::write(channel.write_fd(), buf.as_ptr().cast::<libc::c_void>(), 1)
            };
            assert_eq!(n, 1, "short write into test pipe");
        }

        #[test]
        fn written_byte_delivers_readable_event() {
            init_test("written_byte_delivers_readable_event");
            let Some(mut poller) = new_or_skip() else {
                return;
            };
            let channel = ByteChannel::new().expect("create channel");
            let ticket = poller
                .submit(channel.read_fd(), Interest::READABLE)
                .expect("submit");
            write_one(&channel);

            let wait = poller
                .wait(ticket, Duration::from_secs(1))
                .expect("wait");
            match wait {
                PollWait::Delivered(event) => {
                    crate::assert_with_log!(event.readable, "event readable", true, event.readable);
                }
                PollWait::TimedOut => panic!("readable pipe must deliver within a second"),
            }
            crate::test_complete!("written_byte_delivers_readable_event");
        }

        #[test]
        fn empty_pipe_times_out() {
            init_test("empty_pipe_times_out");
            let Some(mut poller) = new_or_skip() else {
                return;
            };
            let channel = ByteChannel::new().expect("create channel");
            let ticket = poller
                .submit(channel.read_fd(), Interest::READABLE)
                .expect("submit");

            let wait = poller
                .wait(ticket, Duration::from_millis(50))
                .expect("wait");
            crate::assert_with_log!(
                wait == PollWait::TimedOut,
                "empty pipe times out",
                PollWait::TimedOut,
                wait
            );
            crate::test_complete!("empty_pipe_times_out");
        }

        #[test]
        fn second_submit_while_outstanding_is_refused() {
            init_test("second_submit_while_outstanding_is_refused");
            let Some(mut poller) = new_or_skip() else {
                return;
            };
            let channel = ByteChannel::new().expect("create channel");
            let _ticket = poller
                .submit(channel.read_fd(), Interest::READABLE)
                .expect("submit");
            let err = poller
                .submit(channel.read_fd(), Interest::READABLE)
                .expect_err("second watch must be refused");
            let kind = err.kind();
            crate::assert_with_log!(
                kind == ErrorKind::Internal,
                "refusal kind",
                ErrorKind::Internal,
                kind
            );
            crate::test_complete!("second_submit_while_outstanding_is_refused");
        }
    }
}

#[cfg(target_os = "linux")]
pub use imp::UringPoller;

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::super::{Interest, PollTicket, PollWait, ReadinessPoller};
    use crate::error::{Error, Result};
    use std::os::fd::RawFd;
    use std::time::Duration;

    /// Stub poller for non-Linux targets.
    #[derive(Debug, Default)]
    pub struct UringPoller;

    impl UringPoller {
        /// Creates the poller (unsupported off Linux).
        pub fn new() -> Result<Self> {
            Err(Error::unsupported(
                "io_uring readiness polling requires Linux",
            ))
        }
    }

    impl ReadinessPoller for UringPoller {
        fn submit(&mut self, _fd: RawFd, _interest: Interest) -> Result<PollTicket> {
            Err(Error::unsupported(
                "io_uring readiness polling requires Linux",
            ))
        }

        fn wait(&mut self, _ticket: PollTicket, _timeout: Duration) -> Result<PollWait> {
            Err(Error::unsupported(
                "io_uring readiness polling requires Linux",
            ))
        }
    }

}

#[cfg(not(target_os = "linux"))]
pub use imp::UringPoller;
