use serde::{Deserialize, Serialize};

/// Declarative rlimits for a child process.
///
/// All fields are optional:
/// - `None` means "no explicit limit" for that resource.
/// - `disable_core_dumps = false` keeps core dumps enabled (subject to OS defaults).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RlimitConfig {
    /// Maximum number of open file descriptors (`RLIMIT_NOFILE`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_open_files: Option<u64>,

    /// Maximum size of created files in bytes (`RLIMIT_FSIZE`).
    ///
    /// Growing a file past this limit typically delivers `SIGXFSZ` to the child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size_bytes: Option<u64>,

    /// Disable core dumps (`RLIMIT_CORE = 0`) when set to `true`.
    pub disable_core_dumps: bool,
}

impl RlimitConfig {
    /// Returns `true` if no explicit limits are configured.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.max_open_files.is_none()
            && !self.disable_core_dumps
            && self.max_file_size_bytes.is_none()
    }
}
