#![allow(unsafe_code)]
//! The byte reservoir: a one-byte temp file feeding the channel.
//!
//! This module uses unsafe code for the `splice(2)` call that moves the
//! byte into the channel without surfacing it in userspace.
//!
//! The reservoir is created once by the controlling process and opened
//! read-only by every replica. Transfers always splice from offset zero
//! with an explicit per-call offset, so the reservoir is never drained and
//! every round moves the same byte.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use tempfile::NamedTempFile;

use crate::channel::ByteChannel;
use crate::error::{Error, ErrorKind, Result};

/// The byte every transfer moves. The value is arbitrary; only occupancy
/// matters to the protocol.
pub const RESERVOIR_BYTE: u8 = b'!';

/// Owner of the backing temp file. Kept alive by the controlling process;
/// dropping it removes the file.
#[derive(Debug)]
pub struct ByteReservoir {
    file: NamedTempFile,
}

impl ByteReservoir {
    /// Creates the reservoir and seeds it with its single byte.
    pub fn create() -> Result<Self> {
        let mut file = NamedTempFile::new()
            .map_err(|err| Error::setup("creating reservoir temp file", err))?;
        file.write_all(&[RESERVOIR_BYTE])
            .and_then(|()| file.flush())
            .map_err(|err| Error::setup("seeding reservoir byte", err))?;
        Ok(Self { file })
    }

    /// Filesystem path replicas use to open their own handles.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Convenience for single-process runs: a handle onto this reservoir.
    pub fn handle(&self) -> Result<ReservoirHandle> {
        ReservoirHandle::open(self.path())
    }
}

/// A read-only handle onto the reservoir, one per worker.
#[derive(Debug)]
pub struct ReservoirHandle {
    file: File,
    path: PathBuf,
}

impl ReservoirHandle {
    /// Opens the reservoir at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| {
            Error::setup(format!("opening reservoir {}", path.display()), err)
        })?;
        Ok(Self { file, path })
    }

    /// Path this handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Splices the reservoir byte into the channel.
    ///
    /// The offset is a per-call local, so the file position and contents are
    /// untouched and the next transfer moves the same byte again.
    pub fn transfer_into(&self, channel: &ByteChannel) -> Result<()> {
        let mut offset: libc::loff_t = 0;
        loop {
            // SAFETY: both descriptors are open for the duration of the
            // call; offset points at a live stack value; the null out-offset
            // is what splice expects for the pipe side.
            let n = unsafe {
                libc::splice(
                    self.file.as_raw_fd(),
                    &mut offset,
                    channel.write_fd(),
                    ptr::null_mut(),
                    1,
                    0,
                )
            };
            if n == 1 {
                return Ok(());
            }
            if n == 0 {
                return Err(Error::new(ErrorKind::ChannelIo)
                    .with_message("reservoir transfer spliced no bytes; reservoir is empty"));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::channel("splicing reservoir byte into channel", err));
            }
        }
    }
}
