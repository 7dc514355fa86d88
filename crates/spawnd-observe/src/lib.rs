//! Logging for the spawnd crates.
//!
//! - [`logger_init`] installs the global `tracing` subscriber (text, json or journald).
//! - `Journal` (feature `listener`) turns daemon lifecycle events into log records.

mod logger;
pub use logger::*;

#[cfg(feature = "listener")]
mod listener;
#[cfg(feature = "listener")]
pub use listener::*;
