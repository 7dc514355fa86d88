//! Plain data shared by the spawnd crates.
//!
//! Everything here is serde-friendly and free of OS handles, so it can be
//! loaded from configuration files or carried inside lifecycle events.

mod domain;
pub use domain::*;

mod error;
pub use error::ConfigError;
