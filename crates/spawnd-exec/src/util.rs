use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use spawnd_model::ExitStatus;

/// Exit code used when `Task::run` panics inside the child.
pub(crate) const EXIT_PANIC: i32 = 101;
/// Exit code used when the child cannot apply its resource limits.
pub(crate) const EXIT_SETUP_FAILED: i32 = 126;

/// Deliver `signal` to `pid`. A process that is already gone is not an error.
pub fn signal_pid(pid: Pid, signal: Signal) -> Result<(), Errno> {
    match kill(pid, signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Decode a wait status into a terminal [`ExitStatus`], if the child is gone.
pub(crate) fn decode(status: WaitStatus) -> Option<ExitStatus> {
    match status {
        WaitStatus::Exited(_, code) => Some(ExitStatus::Exited(code)),
        WaitStatus::Signaled(_, signal, _) => Some(ExitStatus::Signaled(signal as i32)),
        _ => None,
    }
}

/// Leave the child without running destructors or atexit handlers inherited from the supervisor.
pub(crate) fn exit_child(code: i32) -> ! {
    // SAFETY: _exit is async-signal-safe and valid in a forked child.
    unsafe { libc::_exit(code) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_exited_and_signaled() {
        let pid = Pid::from_raw(42);
        assert_eq!(
            decode(WaitStatus::Exited(pid, 3)),
            Some(ExitStatus::Exited(3))
        );
        assert_eq!(
            decode(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some(ExitStatus::Signaled(9))
        );
        assert_eq!(decode(WaitStatus::StillAlive), None);
    }
}
