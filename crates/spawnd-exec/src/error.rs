use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Errors raised by task callbacks running in the supervisor (`init` / `finish`).
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("init failed: {0}")]
    Init(String),
    #[error("finish failed: {0}")]
    Finish(String),
    #[error("messenger: {0}")]
    Messenger(#[from] MessengerError),
}

/// Errors raised while driving a process through fork / reap / signal.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProcessError {
    /// `Task::init` failed; the process was never forked.
    #[error("task init failed: {0}")]
    Init(#[source] TaskError),

    #[error("fork failed: {0}")]
    Fork(#[source] Errno),

    #[error("process already started")]
    AlreadyStarted,

    #[error("process not started")]
    NotStarted,

    #[error("waitpid failed for pid {pid}: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: Errno,
    },

    /// Child outlived its deadline and was sent `SIGKILL`.
    ///
    /// Recoverable: the process stays live until a later reap observes its death.
    #[error("pid {pid} exceeded max runtime {limit:?} (ran {elapsed:?}); killed")]
    RuntimeExceeded {
        pid: i32,
        elapsed: Duration,
        limit: Duration,
    },

    #[error("failed to send signal {signal:?} to pid {pid}: {source}")]
    Signal {
        pid: i32,
        signal: Signal,
        #[source]
        source: Errno,
    },
}

impl ProcessError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProcessError::Init(_) => "process_init",
            ProcessError::Fork(_) => "process_fork",
            ProcessError::AlreadyStarted => "process_already_started",
            ProcessError::NotStarted => "process_not_started",
            ProcessError::Wait { .. } => "process_wait",
            ProcessError::RuntimeExceeded { .. } => "process_runtime_exceeded",
            ProcessError::Signal { .. } => "process_signal",
        }
    }

    /// Indicates whether the process is still worth keeping in the live table.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProcessError::RuntimeExceeded { .. }
                | ProcessError::Wait { .. }
                | ProcessError::Signal { .. }
        )
    }
}

/// Errors raised by [`crate::Messenger`] implementations.
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("messenger used before init()")]
    NotInitialized,
    #[error("endpoint for this side is closed")]
    Closed,
    #[error("socketpair failed: {0}")]
    Socket(#[source] Errno),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
}
