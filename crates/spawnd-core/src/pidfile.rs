//! PID file collaborator.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use nix::unistd::Pid;

/// Writes `pid` followed by a newline, replacing any previous content.
pub fn write(path: &Path, pid: Pid) -> io::Result<()> {
    fs::write(path, format!("{pid}\n"))
}

/// Removes the file. A file that is already gone is not an error.
pub fn remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("spawnd-{}.pid", uuid::Uuid::new_v4()))
    }

    #[test]
    fn write_then_remove() {
        let path = scratch();
        write(&path, Pid::from_raw(4321)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4321\n");

        remove(&path).unwrap();
        assert!(!path.exists());
        remove(&path).unwrap();
    }

    #[test]
    fn write_replaces_stale_content() {
        let path = scratch();
        fs::write(&path, "999999\nleftover").unwrap();
        write(&path, Pid::from_raw(12)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "12\n");
        remove(&path).unwrap();
    }

    #[test]
    fn missing_directory_fails() {
        let path = PathBuf::from("/nonexistent-spawnd-dir/daemon.pid");
        assert!(write(&path, Pid::from_raw(1)).is_err());
    }
}
