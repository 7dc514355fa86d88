use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use nix::unistd::Pid;
use uuid::Uuid;

use spawnd_model::DaemonConfig;

use super::{Daemon, DetachFn};
use crate::background;
use crate::dispatch::{EventDispatcher, EventKind, Listen};
use crate::error::CoreError;
use crate::producer::Produce;
use crate::signals::SignalRegistry;

/// Explicit wiring for a [`Daemon`]: listeners, producers and collaborators.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use spawnd_core::{Daemon, EventKind, ListenFn, Produced, ProducerFn};
/// use spawnd_model::DaemonConfig;
///
/// let config = DaemonConfig { daemonize: false, ..Default::default() };
/// let mut daemon = Daemon::builder(config)
///     .with_listener(
///         EventKind::ProcessExit,
///         0,
///         Arc::new(ListenFn::new("exit-log", |ev: &spawnd_core::Event| {
///             println!("{:?} exited with {:?}", ev.pid, ev.exit);
///             Ok(())
///         })),
///     )
///     .with_producer(ProducerFn::new("idle", || Produced::Empty))
///     .build()
///     .unwrap();
/// daemon.start().unwrap();
/// ```
pub struct DaemonBuilder {
    config: DaemonConfig,
    dispatcher: EventDispatcher,
    producers: Vec<Box<dyn Produce>>,
    detach: Option<DetachFn>,
}

impl DaemonBuilder {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            dispatcher: EventDispatcher::new(),
            producers: Vec::new(),
            detach: None,
        }
    }

    pub fn with_listener(mut self, kind: EventKind, priority: i32, listener: Arc<dyn Listen>) -> Self {
        self.dispatcher.subscribe(kind, priority, listener);
        self
    }

    /// Subscribes `listener` to every event kind.
    pub fn with_global_listener(mut self, priority: i32, listener: Arc<dyn Listen>) -> Self {
        self.dispatcher.subscribe_all(priority, listener);
        self
    }

    pub fn with_producer<P>(mut self, producer: P) -> Self
    where
        P: Produce + 'static,
    {
        self.producers.push(Box::new(producer));
        self
    }

    /// Replaces [`background::detach`] as the routine used when `daemonize` is set.
    pub fn with_detach<F>(mut self, detach: F) -> Self
    where
        F: FnMut() -> io::Result<Pid> + 'static,
    {
        self.detach = Some(Box::new(detach));
        self
    }

    pub fn build(self) -> Result<Daemon, CoreError> {
        self.config.validate()?;

        let mut daemon = Daemon {
            id: Uuid::new_v4(),
            config: self.config,
            producers: Vec::new(),
            next_producer: 0,
            cursor: 0,
            queue: VecDeque::new(),
            live: BTreeMap::new(),
            dispatcher: self.dispatcher,
            signals: SignalRegistry::new(),
            running: Arc::new(AtomicBool::new(true)),
            detach: self.detach.unwrap_or_else(|| Box::new(background::detach)),
        };
        for producer in self.producers {
            daemon.register(producer);
        }
        Ok(daemon)
    }
}
