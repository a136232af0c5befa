#![allow(unsafe_code)]
//! The byte channel the race runs over: a real OS pipe.
//!
//! This module uses unsafe code for raw fd reads and the `poll(2)` call
//! backing the bounded consume.
//!
//! The readable and writable ends are distinct capabilities over one kernel
//! buffer. Per round the protocol keeps occupancy at exactly zero bytes
//! before the transfers and exactly one after them; nothing here enforces
//! that — enforcement is the whole point of the barrier-driven protocol
//! upstream.

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};

/// A unidirectional byte channel backed by an OS pipe.
#[derive(Debug)]
pub struct ByteChannel {
    read: OwnedFd,
    write: OwnedFd,
}

impl ByteChannel {
    /// Creates the channel. Fatal on failure; the harness cannot run
    /// without it.
    pub fn new() -> Result<Self> {
        let (read, write) =
            nix::unistd::pipe().map_err(|err| Error::setup("creating pipe", io::Error::from(err)))?;
        Ok(Self { read, write })
    }

    /// Raw descriptor of the readable end (the poll target).
    #[must_use]
    pub fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    /// Raw descriptor of the writable end (the splice destination).
    #[must_use]
    pub fn write_fd(&self) -> RawFd {
        self.write.as_raw_fd()
    }

    /// Consumes exactly one byte, blocking until it is present.
    ///
    /// `timeout` bounds the block. In a healthy round the byte is already
    /// present or arrives promptly; the bound only trips when the producer
    /// that owed the byte has already failed, turning a permanent wedge into
    /// a reportable error.
    pub fn consume_byte(&self, timeout: Duration) -> Result<u8> {
        let fd = self.read_fd();
        let ready = await_readable(fd, timeout)
            .map_err(|err| Error::channel("polling channel read end", err))?;
        if !ready {
            return Err(Error::new(ErrorKind::ChannelIo).with_message(format!(
                "no byte arrived within {timeout:?}; the producer that owed it never delivered"
            )));
        }
        match read_byte(fd).map_err(|err| Error::channel("reading channel byte", err))? {
            Some(byte) => Ok(byte),
            None => Err(Error::new(ErrorKind::ChannelIo)
                .with_message("channel write end closed while a byte was owed")),
        }
    }

    /// Reports whether at least one byte is queued right now.
    pub fn has_pending(&self) -> Result<bool> {
        await_readable(self.read_fd(), Duration::ZERO)
            .map_err(|err| Error::channel("probing channel occupancy", err))
    }
}

/// Polls `fd` for readability, retrying on EINTR. Returns false on timeout.
fn await_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    loop {
        // SAFETY: pollfd points at a live stack value for the duration of
        // the call.
        let rc = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        if rc > 0 {
            return Ok(true);
        }
        if rc == 0 {
            return Ok(false);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Reads one byte from `fd`, retrying on EINTR. `None` means EOF.
fn read_byte(fd: RawFd) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    loop {
        // SAFETY: fd is a valid open descriptor and buf outlives the call.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
        if n == 1 {
            return Ok(Some(buf[0]));
        }
        if n == 0 {
            return Ok(None);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
