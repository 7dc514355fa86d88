//! Execution unit of the supervisor: one [`Task`] running in one forked OS process.
//!
//! - [`Task`] is the three-phase contract (`init` → `run` → `finish`) split across the fork.
//! - [`Process`] owns the child handle, its timestamps and the runtime deadline.
//! - [`SocketMessenger`] is the socket-pair channel shared by both sides of the fork.

mod error;
pub use error::{MessengerError, ProcessError, TaskError};

mod task;
pub use task::{ContextTask, Task, TaskBox, TaskFn};

pub mod proc;
pub use proc::{Process, Reaped};

pub mod ipc;
pub use ipc::{Messenger, MessengerExt, Role, SocketMessenger};

mod util;
pub use util::signal_pid;

pub mod utils;

pub use nix::sys::signal::Signal;
pub use nix::unistd::Pid;

pub mod prelude {
    pub use crate::error::{MessengerError, ProcessError, TaskError};
    pub use crate::ipc::{Messenger, MessengerExt, SocketMessenger};
    pub use crate::proc::{Process, Reaped};
    pub use crate::task::{ContextTask, Task, TaskBox, TaskFn};
}
