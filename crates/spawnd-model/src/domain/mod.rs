mod config;
pub use config::DaemonConfig;

mod rlimit;
pub use rlimit::RlimitConfig;

mod exit_status;
pub use exit_status::ExitStatus;

mod process_state;
pub use process_state::ProcessState;

/// Duration value in milliseconds.
///
/// Used in configuration where `0` carries the "disabled / unbounded" meaning.
pub type DurationMs = u64;
