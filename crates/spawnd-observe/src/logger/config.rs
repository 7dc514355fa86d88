use std::env;
use std::io::{self, IsTerminal};

use serde::{Deserialize, Serialize};

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable holding the `EnvFilter` directive (e.g. `info,spawnd.core=debug`).
pub const LOG_LEVEL_ENV: &str = "SPAWND_LOG";
/// Environment variable selecting the backend (`text`, `json`, `journald`).
pub const LOG_FORMAT_ENV: &str = "SPAWND_LOG_FORMAT";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl LoggerConfig {
    /// Defaults overridden by `SPAWND_LOG` and `SPAWND_LOG_FORMAT` when set.
    pub fn from_env() -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            cfg.level = level;
        }
        if let Ok(format) = env::var(LOG_FORMAT_ENV) {
            cfg.format = format.parse()?;
        }
        if cfg.format != LoggerFormat::Text {
            cfg.use_color = false;
        }
        Ok(cfg)
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: io::stderr().is_terminal(),
        }
    }
}
