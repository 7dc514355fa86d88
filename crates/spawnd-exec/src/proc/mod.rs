use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use tracing::{debug, trace, warn};

use spawnd_model::{ExitStatus, ProcessState, RlimitConfig};

use crate::{
    error::ProcessError,
    task::TaskBox,
    util::{decode, signal_pid},
};

mod child;

/// Outcome of a single non-blocking [`Process::reap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaped {
    /// Child is still alive.
    Running,
    /// Child terminated; `finish` has been invoked.
    Exited(ExitStatus),
}

/// Supervisor-side lifecycle wrapper around one forked child running one task.
///
/// Identity is the OS pid, assigned when [`Process::fork`] succeeds.
pub struct Process {
    task: TaskBox,
    producer: Option<Arc<str>>,
    pid: Option<Pid>,
    state: ProcessState,
    started_at: Option<Instant>,
    started_wall: Option<SystemTime>,
    ended_at: Option<Instant>,
    exit_status: Option<ExitStatus>,
    max_runtime: Option<Duration>,
    rlimits: RlimitConfig,
}

impl Process {
    pub fn new(task: TaskBox) -> Self {
        Self {
            task,
            producer: None,
            pid: None,
            state: ProcessState::Queued,
            started_at: None,
            started_wall: None,
            ended_at: None,
            exit_status: None,
            max_runtime: None,
            rlimits: RlimitConfig::default(),
        }
    }

    /// Records the producer that supplied the task.
    pub fn with_producer(mut self, producer: impl Into<Arc<str>>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    /// Sets the runtime deadline (`None` = unbounded).
    pub fn with_max_runtime(mut self, limit: Option<Duration>) -> Self {
        self.max_runtime = limit.filter(|d| !d.is_zero());
        self
    }

    pub fn with_rlimits(mut self, rlimits: RlimitConfig) -> Self {
        self.rlimits = rlimits;
        self
    }

    /// Runs `Task::init`, then forks.
    ///
    /// In the parent, returns the child's pid and moves to [`ProcessState::Running`].
    /// In the child, runs the task and exits with its return value; the call never returns there.
    pub fn fork(&mut self) -> Result<Pid, ProcessError> {
        if self.state != ProcessState::Queued {
            return Err(ProcessError::AlreadyStarted);
        }

        self.started_at = Some(Instant::now());
        self.started_wall = Some(SystemTime::now());
        self.task.init().map_err(ProcessError::Init)?;

        // SAFETY: the child only runs the task on its private copy of the
        // address space and leaves through `_exit`, never returning here.
        match unsafe { fork() }.map_err(ProcessError::Fork)? {
            ForkResult::Parent { child } => {
                self.pid = Some(child);
                self.state = ProcessState::Running;
                debug!(target: "spawnd.exec.process", pid = child.as_raw(), task = self.task.name(), "forked");
                Ok(child)
            }
            ForkResult::Child => child::run_and_exit(self.task.as_mut(), &self.rlimits),
        }
    }

    /// Non-blocking check for termination.
    ///
    /// - terminated: records the end time and status, calls `Task::finish` once,
    ///   returns [`Reaped::Exited`]. Later calls return the same status without
    ///   calling `finish` again.
    /// - alive past its deadline: sends `SIGKILL` and returns
    ///   [`ProcessError::RuntimeExceeded`]; the process stays live.
    /// - alive: returns [`Reaped::Running`].
    pub fn reap(&mut self) -> Result<Reaped, ProcessError> {
        let pid = self.pid.ok_or(ProcessError::NotStarted)?;
        if let Some(status) = self.exit_status {
            return Ok(Reaped::Exited(status));
        }

        let status = waitpid(pid, Some(WaitPidFlag::WNOHANG)).map_err(|source| {
            ProcessError::Wait {
                pid: pid.as_raw(),
                source,
            }
        })?;

        match decode(status) {
            Some(exit) => Ok(self.complete(exit)),
            None => self.check_deadline(pid),
        }
    }

    /// Sends `signal` to the child.
    pub fn send_signal(&self, signal: Signal) -> Result<(), ProcessError> {
        let pid = self.pid.ok_or(ProcessError::NotStarted)?;
        signal_pid(pid, signal).map_err(|source| ProcessError::Signal {
            pid: pid.as_raw(),
            signal,
            source,
        })
    }

    /// Wall time between fork and reap; `None` until both happened.
    pub fn runtime(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    /// Time since the fork, for live processes.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|start| start.elapsed())
    }

    #[inline]
    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    #[inline]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    #[inline]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    #[inline]
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_wall
    }

    #[inline]
    pub fn max_runtime(&self) -> Option<Duration> {
        self.max_runtime
    }

    pub fn task_name(&self) -> &str {
        self.task.name()
    }

    pub fn producer(&self) -> Option<&Arc<str>> {
        self.producer.as_ref()
    }

    fn complete(&mut self, status: ExitStatus) -> Reaped {
        self.ended_at = Some(Instant::now());
        self.exit_status = Some(status);
        self.state = ProcessState::Exited;

        match panic::catch_unwind(AssertUnwindSafe(|| self.task.finish(status))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(target: "spawnd.exec.process", task = self.task.name(), error = %e, "finish failed")
            }
            Err(_) => warn!(target: "spawnd.exec.process", task = self.task.name(), "finish panicked"),
        }
        trace!(target: "spawnd.exec.process", task = self.task.name(), %status, "reaped");
        Reaped::Exited(status)
    }

    fn check_deadline(&mut self, pid: Pid) -> Result<Reaped, ProcessError> {
        let (Some(limit), Some(elapsed)) = (self.max_runtime, self.elapsed()) else {
            return Ok(Reaped::Running);
        };
        // SIGKILL is already on its way; wait for the reap that confirms it.
        if self.state == ProcessState::TimedOut || elapsed <= limit {
            return Ok(Reaped::Running);
        }

        self.send_signal(Signal::SIGKILL)?;
        self.state = ProcessState::TimedOut;
        Err(ProcessError::RuntimeExceeded {
            pid: pid.as_raw(),
            elapsed,
            limit,
        })
    }
}
