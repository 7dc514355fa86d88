use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::Context;
use serde::Deserialize;

use spawnd_model::DaemonConfig;
use spawnd_observe::LoggerConfig;

/// Environment variable consulted when no config path is passed as the first argument.
pub const CONFIG_ENV: &str = "SPAWND_CONFIG";

/// Whole agent configuration file.
///
/// ```json
/// {
///   "daemon": { "name": "squares", "maxConcurrency": 4, "daemonize": false },
///   "logger": { "format": "json", "level": "debug" },
///   "demo":   { "batches": 5, "tasksPerBatch": 3 }
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    pub daemon: DaemonConfig,
    /// Falls back to `SPAWND_LOG` / `SPAWND_LOG_FORMAT` when absent.
    pub logger: Option<LoggerConfig>,
    pub demo: DemoConfig,
}

/// Shape of the work the demo producer hands out.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DemoConfig {
    pub batches: u32,
    pub tasks_per_batch: u32,
    /// Simulated work per task.
    pub work_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            batches: 3,
            tasks_per_batch: 2,
            work_ms: 200,
        }
    }
}

impl AgentConfig {
    /// Loads from `argv[1]`, then `SPAWND_CONFIG`, then falls back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::args_os()
            .nth(1)
            .or_else(|| env::var_os(CONFIG_ENV))
            .map(PathBuf::from);

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.daemon.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_default_independently() {
        let cfg = AgentConfig::from_json_str(r#"{"daemon":{"maxConcurrency":4}}"#).unwrap();
        assert_eq!(cfg.daemon.max_concurrency, 4);
        assert!(cfg.logger.is_none());
        assert_eq!(cfg.demo.batches, 3);
    }

    #[test]
    fn full_document() {
        let cfg = AgentConfig::from_json_str(
            r#"{
                "daemon": {"name": "squares", "daemonize": false, "quietTimeMs": 50},
                "logger": {"format": "json", "level": "debug"},
                "demo": {"batches": 1, "tasksPerBatch": 5, "workMs": 10}
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.daemon.name, "squares");
        assert!(!cfg.daemon.daemonize);
        assert_eq!(cfg.logger.unwrap().level, "debug");
        assert_eq!(cfg.demo.tasks_per_batch, 5);
    }

    #[test]
    fn invalid_daemon_section_is_rejected() {
        assert!(AgentConfig::from_json_str(r#"{"daemon":{"maxConcurrency":0}}"#).is_err());
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = AgentConfig::from_file(Path::new("/nonexistent/agentd.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/agentd.json"));
    }
}
