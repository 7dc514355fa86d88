//! # Lifecycle events published by the daemon.
//!
//! [`EventKind`] names what happened; [`Event`] is the immutable snapshot handed
//! to listeners. Every event carries a process-wide sequence number that
//! increases monotonically, so listeners can restore the exact emission order.
//!
//! ## Example
//! ```rust
//! use spawnd_core::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProcessExit)
//!     .with_pid(4242)
//!     .with_task("resize")
//!     .with_reason("done");
//!
//! assert_eq!(ev.kind.as_str(), "process.exit");
//! assert_eq!(ev.task.as_deref(), Some("resize"));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use spawnd_exec::Process;
use spawnd_model::ExitStatus;
use uuid::Uuid;

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Daemon events ===
    /// The scheduler is about to enter its loop.
    ///
    /// Sets: `daemon`, `pid` (supervisor pid)
    DaemonStart,

    /// The loop has returned and live children were sent `SIGINT`.
    ///
    /// Sets: `daemon`, `live` (children still alive at shutdown)
    DaemonStop,

    /// One loop iteration has completed (before the quiet sleep).
    ///
    /// Sets: `daemon`, `live`
    DaemonIteration,

    /// The supervisor detached into a background session.
    ///
    /// Sets: `daemon`, `pid` (new supervisor pid)
    DaemonDaemonized,

    // === Process events ===
    /// A child was forked and entered the live table.
    ///
    /// Sets: `pid`, `task`, `producer`, `live`
    ProcessStart,

    /// A live child is about to be reaped in this iteration.
    ///
    /// Sets: `pid`, `task`, `producer`
    ProcessIteration,

    /// A child was reaped; `finish` has already run.
    ///
    /// Sets: `pid`, `task`, `producer`, `exit`, `runtime`, `live`
    ProcessExit,

    /// A child outlived its runtime limit and was sent `SIGKILL`.
    ///
    /// Sets: `pid`, `task`, `producer`, `reason`
    ProcessTimeout,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::DaemonStart,
        EventKind::DaemonStop,
        EventKind::DaemonIteration,
        EventKind::DaemonDaemonized,
        EventKind::ProcessStart,
        EventKind::ProcessIteration,
        EventKind::ProcessExit,
        EventKind::ProcessTimeout,
    ];

    /// Stable dotted name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DaemonStart => "daemon.start",
            EventKind::DaemonStop => "daemon.stop",
            EventKind::DaemonIteration => "daemon.iteration",
            EventKind::DaemonDaemonized => "daemon.daemonized",
            EventKind::ProcessStart => "process.start",
            EventKind::ProcessIteration => "process.iteration",
            EventKind::ProcessExit => "process.exit",
            EventKind::ProcessTimeout => "process.timeout",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one lifecycle transition.
///
/// Optional fields are filled depending on [`EventKind`]; see the variant docs.
#[derive(Debug, Clone)]
pub struct Event {
    /// Global sequence number.
    pub seq: u64,
    /// Wall-clock emission time.
    pub at: SystemTime,
    pub kind: EventKind,
    /// Identity of the emitting daemon.
    pub daemon: Option<Uuid>,
    pub pid: Option<i32>,
    pub task: Option<Arc<str>>,
    pub producer: Option<Arc<str>>,
    pub exit: Option<ExitStatus>,
    /// Fork-to-reap wall time.
    pub runtime: Option<Duration>,
    /// Size of the live table when the event was emitted.
    pub live: Option<usize>,
    pub reason: Option<Arc<str>>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            kind,
            daemon: None,
            pid: None,
            task: None,
            producer: None,
            exit: None,
            runtime: None,
            live: None,
            reason: None,
        }
    }

    /// Copies pid, task name, producer, exit status and runtime from `process`.
    pub fn with_process(mut self, process: &Process) -> Self {
        self.pid = process.pid().map(|p| p.as_raw());
        self.task = Some(Arc::from(process.task_name()));
        self.producer = process.producer().cloned();
        self.exit = process.exit_status();
        self.runtime = process.runtime();
        self
    }

    #[inline]
    pub fn with_daemon(mut self, id: Uuid) -> Self {
        self.daemon = Some(id);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = Some(pid);
        self
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_exit(mut self, exit: ExitStatus) -> Self {
        self.exit = Some(exit);
        self
    }

    #[inline]
    pub fn with_live(mut self, live: usize) -> Self {
        self.live = Some(live);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
