use std::io;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

use spawnd_exec::ProcessError;
use spawnd_model::ConfigError;

/// Errors surfaced by the scheduler to its caller.
///
/// Only setup paths return these: everything that goes wrong inside one loop
/// iteration is logged and the loop keeps going.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to detach into background: {0}")]
    Detach(#[source] io::Error),

    #[error("pid file {path}: {source}")]
    Pidfile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to change disposition of {signal:?}: {source}")]
    Signal {
        signal: Signal,
        #[source]
        source: Errno,
    },
}

impl CoreError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "core_config",
            CoreError::Process(e) => e.as_label(),
            CoreError::Detach(_) => "core_detach",
            CoreError::Pidfile { .. } => "core_pidfile",
            CoreError::Signal { .. } => "core_signal",
        }
    }
}

/// A producer broke its contract or failed outright; it gets deregistered.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error("contract violation: {0}")]
    Contract(String),
    #[error("producer failed: {0}")]
    Failed(String),
}

/// Returned by an event listener; logged by the dispatcher, never propagated.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct ListenerError(String);

impl ListenerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
