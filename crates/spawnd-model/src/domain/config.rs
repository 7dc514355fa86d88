use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, DurationMs, RlimitConfig};

/// Supervisor configuration.
///
/// ## Sentinel values
/// - `max_child_runtime_ms = 0` → children may run forever
///
/// Missing fields fall back to [`DaemonConfig::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaemonConfig {
    /// Name used for logs and the daemon identity.
    pub name: String,
    /// Maximum number of child processes alive at once.
    pub max_concurrency: usize,
    /// Sleep between two loop iterations.
    pub quiet_time_ms: DurationMs,
    /// Per-child runtime limit; the child is killed once it is exceeded.
    pub max_child_runtime_ms: DurationMs,
    /// Detach into a background session before entering the loop.
    pub daemonize: bool,
    /// Leave the loop once producers are drained and no child is alive.
    pub stop_when_producers_empty: bool,
    /// Where to persist the supervisor pid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    /// Resource limits applied to every child before it runs its task.
    pub rlimits: RlimitConfig,
}

impl DaemonConfig {
    /// Returns the pause between loop iterations.
    #[inline]
    pub fn quiet_time(&self) -> Duration {
        Duration::from_millis(self.quiet_time_ms)
    }

    /// Returns the per-child runtime limit as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(d)` → children older than `d` are killed at reap time
    #[inline]
    pub fn max_child_runtime(&self) -> Option<Duration> {
        if self.max_child_runtime_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.max_child_runtime_ms))
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".into()));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "maxConcurrency must be a positive integer".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: DaemonConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }
}

impl Default for DaemonConfig {
    /// Default configuration:
    ///
    /// - `max_concurrency = 100`
    /// - `quiet_time = 1s`
    /// - `max_child_runtime = 0` (unbounded)
    /// - `daemonize = true`
    /// - `stop_when_producers_empty = false`
    fn default() -> Self {
        Self {
            name: "spawnd".to_string(),
            max_concurrency: 100,
            quiet_time_ms: 1_000,
            max_child_runtime_ms: 0,
            daemonize: true,
            stop_when_producers_empty: false,
            pid_file: None,
            rlimits: RlimitConfig::default(),
        }
    }
}
