use std::panic::{self, AssertUnwindSafe};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, sigaction, sigprocmask};
use spawnd_model::RlimitConfig;

use crate::task::Task;
use crate::util::{EXIT_PANIC, EXIT_SETUP_FAILED, exit_child};
use crate::utils::apply_rlimits;

/// Child side of a fork: apply limits, run the task, leave with its exit code.
///
/// Never returns into the caller; every path ends in `_exit`.
pub(super) fn run_and_exit(task: &mut dyn Task, rlimits: &RlimitConfig) -> ! {
    reset_signals();
    if apply_rlimits(rlimits).is_err() {
        exit_child(EXIT_SETUP_FAILED);
    }

    let code = match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(code) => code,
        Err(_) => EXIT_PANIC,
    };
    exit_child(code)
}

/// Drops the supervisor's handlers and mask so the task sees default signal behaviour.
fn reset_signals() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for signal in Signal::iterator() {
        if matches!(signal, Signal::SIGKILL | Signal::SIGSTOP) {
            continue;
        }
        // SAFETY: installs SIG_DFL only.
        let _ = unsafe { sigaction(signal, &default) };
    }
    let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
}
