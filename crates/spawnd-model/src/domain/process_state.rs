use serde::{Deserialize, Serialize};

/// Lifecycle state of a supervised process.
///
/// ```text
/// Queued ──fork──► Running ──reap──► Exited
///                     │                 ▲
///                     └──deadline──► TimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessState {
    /// Waiting in the pending queue; no OS process exists yet.
    Queued,
    /// Forked and not yet reaped.
    Running,
    /// Killed for exceeding its runtime limit; waiting for the reap that confirms it.
    TimedOut,
    /// Reaped; terminal.
    Exited,
}

impl ProcessState {
    /// Returns `true` while the process belongs in the live table.
    pub fn is_live(&self) -> bool {
        matches!(self, ProcessState::Running | ProcessState::TimedOut)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_states() {
        assert!(ProcessState::Running.is_live());
        assert!(ProcessState::TimedOut.is_live());

        assert!(!ProcessState::Queued.is_live());
        assert!(!ProcessState::Exited.is_live());
    }

    #[test]
    fn only_exited_is_terminal() {
        assert!(ProcessState::Exited.is_terminal());
        assert!(!ProcessState::TimedOut.is_terminal());
    }
}
