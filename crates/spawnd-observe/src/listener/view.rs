use spawnd_core::{Event, EventKind};
use tracing::{debug, info, trace, warn};

/// Read-only accessors with log-friendly fallbacks.
pub trait View {
    fn kind(&self) -> EventKind;
    fn as_task(&self) -> &str;
    fn as_producer(&self) -> &str;
    fn as_reason(&self) -> &str;
    fn pid(&self) -> i32;
    fn live(&self) -> usize;
    fn runtime_ms(&self) -> u64;
    fn exit(&self) -> String;
}

impl View for Event {
    #[inline]
    fn kind(&self) -> EventKind {
        self.kind
    }
    #[inline]
    fn as_task(&self) -> &str {
        self.task.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn as_producer(&self) -> &str {
        self.producer.as_deref().unwrap_or("none")
    }
    #[inline]
    fn as_reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("unknown")
    }
    #[inline]
    fn pid(&self) -> i32 {
        self.pid.unwrap_or(0)
    }
    #[inline]
    fn live(&self) -> usize {
        self.live.unwrap_or(0)
    }
    #[inline]
    fn runtime_ms(&self) -> u64 {
        self.runtime.map_or(0, |d| d.as_millis() as u64)
    }
    fn exit(&self) -> String {
        self.exit.map_or_else(|| "unknown".to_string(), |s| s.to_string())
    }
}

#[inline]
pub fn message_for(kind: EventKind) -> &'static str {
    match kind {
        // daemon
        EventKind::DaemonStart => "daemon entering its loop",
        EventKind::DaemonStop => "daemon left its loop",
        EventKind::DaemonIteration => "loop iteration finished",
        EventKind::DaemonDaemonized => "daemon detached into background",

        // process
        EventKind::ProcessStart => "child forked",
        EventKind::ProcessIteration => "checking child",
        EventKind::ProcessExit => "child reaped",
        EventKind::ProcessTimeout => "child exceeded its max runtime and was killed",
    }
}

pub fn log_event<E: View>(e: &E) {
    let msg = message_for(e.kind());

    match e.kind() {
        EventKind::DaemonStart => info!(target: "spawnd.journal", pid = e.pid(), "{msg}"),
        EventKind::DaemonDaemonized => info!(target: "spawnd.journal", pid = e.pid(), "{msg}"),
        EventKind::DaemonStop => info!(target: "spawnd.journal", live = e.live(), "{msg}"),
        EventKind::DaemonIteration => trace!(target: "spawnd.journal", live = e.live(), "{msg}"),

        EventKind::ProcessStart => debug!(
            target: "spawnd.journal",
            pid = e.pid(),
            task = e.as_task(),
            producer = e.as_producer(),
            live = e.live(),
            "{msg}"
        ),
        EventKind::ProcessIteration => {
            trace!(target: "spawnd.journal", pid = e.pid(), task = e.as_task(), "{msg}")
        }
        EventKind::ProcessExit => debug!(
            target: "spawnd.journal",
            pid = e.pid(),
            task = e.as_task(),
            exit = %e.exit(),
            runtime_ms = e.runtime_ms(),
            "{msg}"
        ),
        EventKind::ProcessTimeout => warn!(
            target: "spawnd.journal",
            pid = e.pid(),
            task = e.as_task(),
            reason = e.as_reason(),
            "{msg}"
        ),
    }
}

/// Severity used by [`log_event`]; handy for filtering before formatting.
pub fn level_for(kind: EventKind) -> tracing::Level {
    match kind {
        EventKind::DaemonStart | EventKind::DaemonDaemonized | EventKind::DaemonStop => {
            tracing::Level::INFO
        }
        EventKind::ProcessStart | EventKind::ProcessExit => tracing::Level::DEBUG,
        EventKind::ProcessTimeout => tracing::Level::WARN,
        EventKind::DaemonIteration | EventKind::ProcessIteration => tracing::Level::TRACE,
    }
}
