use std::fmt;

use serde::{Deserialize, Serialize};

/// How a child process terminated, as decoded from the wait status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitStatus {
    /// Child called `exit`; carries the low 8 bits of its exit code.
    Exited(i32),
    /// Child was terminated by a signal; carries the signal number.
    Signaled(i32),
}

impl ExitStatus {
    /// Exit code, if the child exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            ExitStatus::Signaled(_) => None,
        }
    }

    /// Terminating signal, if any.
    pub fn signal(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(_) => None,
            ExitStatus::Signaled(signo) => Some(*signo),
        }
    }

    /// Returns `true` for a normal exit with code `0`.
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {code}"),
            ExitStatus::Signaled(signo) => write!(f, "killed by signal {signo}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exited_exposes_code() {
        let status = ExitStatus::Exited(7);
        assert_eq!(status.code(), Some(7));
        assert_eq!(status.signal(), None);
        assert!(!status.success());
        assert!(ExitStatus::Exited(0).success());
    }

    #[test]
    fn signaled_exposes_signal() {
        let status = ExitStatus::Signaled(9);
        assert_eq!(status.code(), None);
        assert_eq!(status.signal(), Some(9));
        assert_eq!(status.to_string(), "killed by signal 9");
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&ExitStatus::Exited(3)).unwrap();
        assert_eq!(json, r#"{"exited":3}"#);
    }
}
