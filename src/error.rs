//! Error types and error handling strategy for the harness.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - No error is recovered locally: every actor returns its error up to the
//!   iteration driver, and the binary's `main` is the single point of
//!   process termination
//! - Every kind maps to a process exit code via [`Error::exit_code`]
//!
//! # Error Categories
//!
//! - **Setup**: the environment could not be prepared (temp file, pipe,
//!   ring, thread or process creation)
//! - **Runtime**: an operation that should not fail did (channel I/O,
//!   readiness backend, broken internal invariant)
//! - **Violation**: the condition the harness exists to catch — a readiness
//!   completion that was never delivered
//! - **Incapability**: the environment lacks the facility under test; the
//!   run is skipped rather than failed

use core::fmt;
use std::sync::Arc;

use crate::exit::ExitCode;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Setup ===
    /// Environment preparation failed (temp file, pipe, ring, threads).
    Setup,
    /// Invalid harness configuration.
    Config,
    /// Child process creation or collection failed.
    Replication,

    // === Runtime ===
    /// Unexpected I/O failure on a channel operation.
    ChannelIo,
    /// The readiness backend reported an OS error.
    PollBackend,
    /// Broken internal invariant (a harness bug, not an environment fault).
    Internal,

    // === Violation ===
    /// A readiness completion that should have been delivered was lost.
    WakeupLost,

    // === Incapability ===
    /// The readiness facility is not available in this environment.
    Unsupported,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Setup | Self::Config | Self::Replication => ErrorCategory::Setup,
            Self::ChannelIo | Self::PollBackend | Self::Internal => ErrorCategory::Runtime,
            Self::WakeupLost => ErrorCategory::Violation,
            Self::Unsupported => ErrorCategory::Incapability,
        }
    }

    /// Returns the process exit code this kind maps to.
    ///
    /// Only the skip outcome leaves the failure scale; every other kind is a
    /// hard failure. The violation shares the failure code and is
    /// distinguished by its logged message.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Unsupported => ExitCode::SKIPPED,
            _ => ExitCode::FAILURE,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Environment preparation failures.
    Setup,
    /// Failures of operations that should not fail in a usable environment.
    Runtime,
    /// The detected property violation.
    Violation,
    /// The environment cannot run the measurement at all.
    Incapability,
}

/// The main error type for harness operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the process exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    /// Returns true if this error is the skip outcome.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self.kind, ErrorKind::Unsupported)
    }

    /// Returns true if this error is the detected property violation.
    #[must_use]
    pub const fn is_violation(&self) -> bool {
        matches!(self.kind, ErrorKind::WakeupLost)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Creates a setup error around an OS-level failure.
    #[must_use]
    pub fn setup(what: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(ErrorKind::Setup)
            .with_message(what)
            .with_source(source)
    }

    /// Creates a channel I/O error around an OS-level failure.
    #[must_use]
    pub fn channel(what: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(ErrorKind::ChannelIo)
            .with_message(what)
            .with_source(source)
    }

    /// Creates a readiness backend error around an OS-level failure.
    #[must_use]
    pub fn poll_backend(what: impl Into<String>, source: std::io::Error) -> Self {
        Self::new(ErrorKind::PollBackend)
            .with_message(what)
            .with_source(source)
    }

    /// Creates an unsupported-environment error (the skip outcome).
    #[must_use]
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported).with_message(detail)
    }

    /// Creates an internal error (harness bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A `Result` alias using the harness [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
