//! Default background detach: double fork into a new session.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;

use nix::unistd::{ForkResult, Pid, chdir, dup2, fork, getpid, setsid};

/// Detaches the calling process from its terminal and returns the new pid.
///
/// 1. fork; the original process exits
/// 2. `setsid` makes the child a session leader
/// 3. fork again so the daemon can never reacquire a terminal
/// 4. `chdir("/")` and point stdin/stdout/stderr at `/dev/null`
///
/// Only the final grandchild returns from this call.
pub fn detach() -> io::Result<Pid> {
    leave_parent()?;
    setsid()?;
    leave_parent()?;

    chdir("/")?;
    redirect_stdio()?;
    Ok(getpid())
}

fn leave_parent() -> io::Result<()> {
    // SAFETY: the parent branch exits immediately through _exit.
    match unsafe { fork() }? {
        ForkResult::Parent { .. } => unsafe { libc::_exit(0) },
        ForkResult::Child => Ok(()),
    }
}

fn redirect_stdio() -> io::Result<()> {
    let null = OpenOptions::new().read(true).write(true).open("/dev/null")?;
    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        dup2(null.as_raw_fd(), fd)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, Instant};
    use std::{fs, thread};

    use nix::sys::wait::{WaitStatus, waitpid};

    #[test]
    fn detached_grandchild_runs_in_root() {
        let report = std::env::temp_dir().join(format!("spawnd-detach-{}", uuid::Uuid::new_v4()));

        // SAFETY: the child only detaches, writes one file and leaves through _exit.
        let child = match unsafe { fork() }.unwrap() {
            ForkResult::Child => {
                let code = match detach() {
                    Ok(pid) => {
                        let cwd = std::env::current_dir().unwrap_or_default();
                        let body = format!("{}|{}", pid, cwd.display());
                        let staged = report.with_extension("tmp");
                        let written = fs::write(&staged, body).and_then(|_| fs::rename(&staged, &report));
                        if written.is_ok() { 0 } else { 1 }
                    }
                    Err(_) => 2,
                };
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => child,
        };

        // The first fork level exits as soon as it has forked.
        assert_eq!(waitpid(child, None).unwrap(), WaitStatus::Exited(child, 0));

        let deadline = Instant::now() + Duration::from_secs(10);
        while !report.exists() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let body = fs::read_to_string(&report).unwrap();
        let (pid, cwd) = body.split_once('|').unwrap();
        assert_ne!(pid.parse::<i32>().unwrap(), child.as_raw());
        assert_ne!(pid.parse::<i32>().unwrap(), getpid().as_raw());
        assert_eq!(cwd, "/");
        let _ = fs::remove_file(&report);
    }
}
