#![allow(unsafe_code)]
//! Process replication for parallel race instances.
//!
//! This module uses unsafe code for Unix process creation (fork).
//!
//! Each replica is a forked child running one worker instance. Isolation
//! is the point: a replica that crashes or wedges cannot take the
//! controller or its siblings down, and every replica races on its own
//! channel with its own kernel state.

use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use crate::error::{Error, ErrorKind};
use crate::exit::ExitCode;

/// Error type for replication operations.
#[derive(Debug, thiserror::Error)]
pub enum ReplicateError {
    /// Forking a replica failed.
    #[error("forking replica {index}: {source}")]
    Fork {
        /// Replica index that failed to fork.
        index: usize,
        /// Underlying errno.
        #[source]
        source: nix::Error,
    },

    /// Waiting on a replica failed.
    #[error("waiting for replica {pid}: {source}")]
    Wait {
        /// Process id that could not be awaited.
        pid: i32,
        /// Underlying errno.
        #[source]
        source: nix::Error,
    },
}

impl From<ReplicateError> for Error {
    fn from(err: ReplicateError) -> Self {
        Error::new(ErrorKind::Replication)
            .with_message("replicating workers")
            .with_source(err)
    }
}

/// How a replica terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Exited normally with a code.
    Exited(i32),
    /// Terminated by a signal.
    Signaled(i32),
}

impl WorkerStatus {
    /// Effective exit code, with signal deaths mapped to the conventional
    /// 128+signal range.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => ExitCode::from_signal(*signal),
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code: {code}"),
            Self::Signaled(signal) => write!(f, "signal: {signal}"),
        }
    }
}

/// One replica's identity and terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Process id the replica ran under.
    pub pid: i32,
    /// Terminal status.
    pub status: WorkerStatus,
}

/// Forks `workers` replicas and waits for all of them, in spawn order.
///
/// `child_main` runs inside each child with the replica index; its return
/// value becomes that child's exit code, and the child never returns from
/// this function.
///
/// # Errors
///
/// Fails when a fork or wait syscall fails. Replicas spawned before a
/// fork failure are still awaited first, so none are left running or
/// unreaped when the error returns.
pub fn replicate<F>(workers: usize, child_main: F) -> Result<Vec<WorkerExit>, ReplicateError>
where
    F: Fn(usize) -> i32,
{
    let mut children: Vec<Pid> = Vec::with_capacity(workers);
    let mut fork_failure: Option<ReplicateError> = None;

    for index in 0..workers {
        // SAFETY: the controller has no other running threads when this is
        // called, so no lock is held across the fork. The child builds its
        // own worker from scratch and leaves through `process::exit`
        // without unwinding into inherited state.
        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                tracing::debug!(replica = index, pid = child.as_raw(), "forked replica");
                children.push(child);
            }
            Ok(ForkResult::Child) => {
                let code = child_main(index);
                std::process::exit(code);
            }
            Err(err) => {
                fork_failure = Some(ReplicateError::Fork { index, source: err });
                break;
            }
        }
    }

    let mut exits = Vec::with_capacity(children.len());
    let mut wait_failure: Option<ReplicateError> = None;
    for pid in children {
        match wait_for(pid) {
            Ok(exit) => {
                tracing::debug!(pid = exit.pid, status = %exit.status, "replica finished");
                exits.push(exit);
            }
            Err(err) => {
                if wait_failure.is_none() {
                    wait_failure = Some(err);
                }
            }
        }
    }

    if let Some(err) = fork_failure {
        return Err(err);
    }
    if let Some(err) = wait_failure {
        return Err(err);
    }
    Ok(exits)
}

/// Waits for one replica to terminate, riding out EINTR and non-terminal
/// wait states.
fn wait_for(pid: Pid) -> Result<WorkerExit, ReplicateError> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                return Ok(WorkerExit {
                    pid: pid.as_raw(),
                    status: WorkerStatus::Exited(code),
                })
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                return Ok(WorkerExit {
                    pid: pid.as_raw(),
                    status: WorkerStatus::Signaled(signal as i32),
                })
            }
            Ok(_) => {}
            Err(nix::Error::EINTR) => {}
            Err(err) => {
                return Err(ReplicateError::Wait {
                    pid: pid.as_raw(),
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_test(name: &str) {
        crate::test_utils::init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn replicas_report_their_exit_codes_in_spawn_order() {
        init_test("replicas_report_their_exit_codes_in_spawn_order");
        let exits = replicate(3, |index| 40 + i32::try_from(index).expect("small index"))
            .expect("replicate");
        crate::assert_with_log!(exits.len() == 3, "replica count", 3usize, exits.len());
        for (index, exit) in exits.iter().enumerate() {
            let expected = WorkerStatus::Exited(40 + i32::try_from(index).expect("small index"));
            crate::assert_with_log!(
                exit.status == expected,
                "replica status",
                expected,
                exit.status
            );
        }
        crate::test_complete!("replicas_report_their_exit_codes_in_spawn_order");
    }

    #[test]
    fn zero_workers_is_an_empty_run() {
        init_test("zero_workers_is_an_empty_run");
        let exits = replicate(0, |_| 0).expect("replicate");
        crate::assert_with_log!(exits.is_empty(), "no replicas", true, exits.is_empty());
        crate::test_complete!("zero_workers_is_an_empty_run");
    }

    #[test]
    fn worker_status_display_matches_process_conventions() {
        init_test("worker_status_display_matches_process_conventions");
        let exited = WorkerStatus::Exited(3).to_string();
        crate::assert_with_log!(
            exited == "exit code: 3",
            "exited display",
            "exit code: 3",
            exited
        );
        let signaled = WorkerStatus::Signaled(9).to_string();
        crate::assert_with_log!(
            signaled == "signal: 9",
            "signaled display",
            "signal: 9",
            signaled
        );
        crate::test_complete!("worker_status_display_matches_process_conventions");
    }
}
