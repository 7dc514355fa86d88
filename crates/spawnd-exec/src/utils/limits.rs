//! POSIX rlimit-based resource limits for forked children.
//!
//! ## Overview
//!
//! Limits from [`RlimitConfig`] are applied by the child itself, right after `fork()`
//! and before `Task::run`, so the task never runs without the intended restrictions.
//! The supervisor's own limits are left untouched.
use std::io;

use spawnd_model::RlimitConfig;

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
        type Resource = libc::__rlimit_resource_t;
    } else {
        type Resource = libc::c_int;
    }
}

/// Apply `config` to the calling process.
///
/// Must only be called in a freshly forked child.
pub fn apply_rlimits(config: &RlimitConfig) -> io::Result<()> {
    if config.is_empty() {
        return Ok(());
    }

    if let Some(nofile) = config.max_open_files {
        apply_rlimit(libc::RLIMIT_NOFILE, nofile)?;
    }
    if let Some(fsize) = config.max_file_size_bytes {
        apply_rlimit(libc::RLIMIT_FSIZE, fsize)?;
    }
    if config.disable_core_dumps {
        apply_rlimit(libc::RLIMIT_CORE, 0)?;
    }
    Ok(())
}

fn apply_rlimit(resource: Resource, value: u64) -> io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: value as libc::rlim_t,
        rlim_max: value as libc::rlim_t,
    };

    // SAFETY: `rlim` is a valid, fully initialised rlimit struct.
    let rc = unsafe { libc::setrlimit(resource, &rlim) };
    if rc != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::{ForkResult, fork};

    #[test]
    fn empty_config_is_noop() {
        assert!(apply_rlimits(&RlimitConfig::default()).is_ok());
    }

    #[test]
    fn limits_apply_inside_a_child_only() {
        let config = RlimitConfig {
            max_open_files: Some(64),
            max_file_size_bytes: None,
            disable_core_dumps: true,
        };

        // SAFETY: the child only touches its own memory and leaves through _exit.
        match unsafe { fork() }.expect("fork") {
            ForkResult::Child => {
                let ok = apply_rlimits(&config).is_ok();
                let mut rlim = libc::rlimit {
                    rlim_cur: 0,
                    rlim_max: 0,
                };
                // SAFETY: rlim is a valid out-pointer.
                let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) };
                let code = if ok && rc == 0 && rlim.rlim_cur == 64 { 0 } else { 1 };
                crate::util::exit_child(code)
            }
            ForkResult::Parent { child } => {
                let status = waitpid(child, None).expect("waitpid");
                assert_eq!(status, WaitStatus::Exited(child, 0));
            }
        }
    }
}
