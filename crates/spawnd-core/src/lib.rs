//! Scheduler of the spawnd supervisor.
//!
//! - [`Daemon`] pulls tasks from [`Produce`] implementations, forks them under a
//!   concurrency cap and reaps them without blocking.
//! - [`EventDispatcher`] carries lifecycle [`Event`]s to registered listeners.
//! - [`SignalRegistry`] maps OS signals to listeners run from the loop.

mod error;
pub use error::{CoreError, ListenerError, ProducerError};

pub mod dispatch;
pub use dispatch::{Event, EventDispatcher, EventKind, Listen, ListenFn};

pub mod signals;
pub use signals::{ListenerId, SignalListener, SignalRegistry};

pub mod producer;
pub use producer::{Produce, Produced, ProducerFn, ProducerId, Subscription};

pub mod daemon;
pub use daemon::{Daemon, DaemonBuilder, DetachFn, StopHandle, TickReport};

pub mod background;
pub mod pidfile;
