//! # Scheduler loop.
//!
//! [`Daemon`] owns the producer set, the pending queue and the live table, and
//! drives one iteration at a time:
//!
//! ```text
//!  ┌────────────┐   ┌──────────────┐   ┌──────────────────────────┐   ┌─────────────────┐
//!  │ fill_queue │─► │ start_queued │─► │ reap_live                │─► │ daemon.iteration│─► sleep(quiet)
//!  │ round-robin│   │ fork ≤ max   │   │ process.iteration + reap │   └─────────────────┘
//!  └────────────┘   └──────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Failure policy
//! Fork, init, reap and listener failures are logged per process; nothing that
//! happens inside an iteration ends the loop. Only [`Daemon::stop`] (or a
//! [`StopHandle`]) does, checked at the top of the next iteration.
//!
//! ## Fairness
//! A rotating cursor remembers where the previous fill stopped, so every fill
//! starts with the producer after the last one served. A batch is always
//! enqueued whole; free capacity is `max_concurrency − live − queued`.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use nix::unistd::{Pid, getpid};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use spawnd_exec::{Process, ProcessError, Reaped, Signal, TaskBox};
use spawnd_model::DaemonConfig;

use crate::dispatch::{Event, EventDispatcher, EventKind, Listen};
use crate::error::CoreError;
use crate::pidfile;
use crate::producer::{Produce, ProducerId};
use crate::signals::SignalRegistry;

mod builder;
pub use builder::DaemonBuilder;

/// Background detach routine; returns the pid of the detached supervisor.
pub type DetachFn = Box<dyn FnMut() -> io::Result<Pid>>;

/// Clonable handle that ends the loop at its next top-of-iteration check.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        !self.0.load(Ordering::SeqCst)
    }
}

/// What one [`Daemon::tick`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks pulled from producers.
    pub produced: usize,
    /// Children forked.
    pub started: usize,
    /// Children reaped.
    pub exited: usize,
    /// Every producer was polled with capacity to spare and none yielded work.
    pub drained: bool,
}

struct ProducerSlot {
    id: ProducerId,
    name: Arc<str>,
    producer: Box<dyn Produce>,
    listener: Option<Arc<dyn Listen>>,
}

pub struct Daemon {
    id: Uuid,
    config: DaemonConfig,
    producers: Vec<ProducerSlot>,
    next_producer: u64,
    cursor: usize,
    queue: VecDeque<Process>,
    live: BTreeMap<i32, Process>,
    dispatcher: EventDispatcher,
    signals: SignalRegistry,
    running: Arc<AtomicBool>,
    detach: DetachFn,
}

impl Daemon {
    /// Validates `config` and builds a daemon with the default collaborators.
    pub fn new(config: DaemonConfig) -> Result<Self, CoreError> {
        DaemonBuilder::new(config).build()
    }

    pub fn builder(config: DaemonConfig) -> DaemonBuilder {
        DaemonBuilder::new(config)
    }

    /// Registers a producer; a producer with a [`crate::Subscription`] is also
    /// subscribed to the dispatcher.
    pub fn add_producer<P>(&mut self, producer: P) -> ProducerId
    where
        P: Produce + 'static,
    {
        self.register(Box::new(producer))
    }

    pub fn add_boxed_producer(&mut self, producer: Box<dyn Produce>) -> ProducerId {
        self.register(producer)
    }

    /// Deregisters a producer and its listener. Unknown ids are ignored.
    pub fn remove_producer(&mut self, id: ProducerId) -> bool {
        match self.producers.iter().position(|slot| slot.id == id) {
            Some(idx) => {
                self.deregister(idx);
                true
            }
            None => false,
        }
    }

    /// Pulls tasks from producers until free capacity is used or a full pass
    /// yields nothing. Returns the number of tasks enqueued.
    pub fn fill_queue(&mut self) -> usize {
        self.fill().0
    }

    /// Runs one iteration without the quiet sleep.
    pub fn tick(&mut self) -> TickReport {
        let (produced, drained) = self.fill();
        let started = self.start_queued();
        let exited = self.reap_live();

        let ev = self.event(EventKind::DaemonIteration).with_live(self.live.len());
        self.dispatcher.dispatch(&ev);

        TickReport {
            produced,
            started,
            exited,
            drained,
        }
    }

    /// Returns the number of tasks enqueued and whether producers are drained.
    ///
    /// Drained means a full pass ran with free capacity and yielded nothing.
    /// A fill that had no capacity polled nobody and is never drained.
    fn fill(&mut self) -> (usize, bool) {
        let free = self.free_capacity();
        let mut enqueued = 0;
        let mut drained = false;

        while enqueued < free && !self.producers.is_empty() {
            let mut pass_yield = 0;
            let mut visits = self.producers.len();

            while visits > 0 && enqueued < free && !self.producers.is_empty() {
                visits -= 1;
                let idx = self.cursor % self.producers.len();
                self.cursor = idx;

                let Some(tasks) = self.poll(idx) else {
                    // Deregistered; the next producer now sits at `idx`.
                    continue;
                };
                self.cursor = idx + 1;

                let name = Arc::clone(&self.producers[idx].name);
                pass_yield += tasks.len();
                enqueued += tasks.len();
                for task in tasks {
                    self.enqueue(task, &name);
                }
            }

            if pass_yield == 0 {
                drained = true;
                break;
            }
        }
        if self.producers.is_empty() {
            drained = true;
        }

        if enqueued > 0 {
            debug!(target: "spawnd.core.daemon", enqueued, queued = self.queue.len(), "queue filled");
        }
        (enqueued, drained)
    }

    /// Iterates until stopped; then sends `SIGINT` to every live child without waiting.
    pub fn run_loop(&mut self) {
        loop {
            self.signals.dispatch_pending();
            if !self.is_running() {
                debug!(target: "spawnd.core.daemon", "stop requested");
                break;
            }

            let report = self.tick();
            if self.config.stop_when_producers_empty
                && report.drained
                && self.live.is_empty()
                && self.queue.is_empty()
            {
                info!(target: "spawnd.core.daemon", "producers drained and no child alive; stopping");
                break;
            }

            thread::sleep(self.config.quiet_time());
        }

        let interrupted = self.interrupt_live();
        if interrupted > 0 {
            info!(target: "spawnd.core.daemon", interrupted, "sent SIGINT to live children");
        }
    }

    /// Detaches (if configured), writes the pid file, runs the loop and cleans up.
    ///
    /// Only a failed detach is returned as an error; pid file problems are logged.
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.config.daemonize {
            let pid = (self.detach)().map_err(CoreError::Detach)?;
            info!(target: "spawnd.core.daemon", pid = pid.as_raw(), "became daemon");
            let ev = self.event(EventKind::DaemonDaemonized).with_pid(pid.as_raw());
            self.dispatcher.dispatch(&ev);
        }

        let pid_file = self.config.pid_file.clone();
        if let Some(path) = &pid_file {
            if let Err(source) = pidfile::write(path, getpid()) {
                let e = CoreError::Pidfile {
                    path: path.display().to_string(),
                    source,
                };
                error!(target: "spawnd.core.daemon", error = %e, "failed to write pid file");
            }
        }

        info!(
            target: "spawnd.core.daemon",
            name = %self.config.name,
            id = %self.id,
            max_concurrency = self.config.max_concurrency,
            quiet_time_ms = self.config.quiet_time_ms,
            "daemon starting"
        );
        let ev = self.event(EventKind::DaemonStart).with_pid(getpid().as_raw());
        self.dispatcher.dispatch(&ev);

        self.run_loop();

        let ev = self.event(EventKind::DaemonStop).with_live(self.live.len());
        self.dispatcher.dispatch(&ev);

        if let Some(path) = &pid_file {
            if let Err(source) = pidfile::remove(path) {
                let e = CoreError::Pidfile {
                    path: path.display().to_string(),
                    source,
                };
                warn!(target: "spawnd.core.daemon", error = %e, "failed to remove pid file");
            }
        }
        info!(target: "spawnd.core.daemon", live = self.live.len(), "daemon stopped");
        Ok(())
    }

    /// Idempotent; takes effect at the next loop-top check.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.running))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    pub fn signals_mut(&mut self) -> &mut SignalRegistry {
        &mut self.signals
    }

    fn free_capacity(&self) -> usize {
        self.config
            .max_concurrency
            .saturating_sub(self.live.len() + self.queue.len())
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_daemon(self.id)
    }

    fn register(&mut self, producer: Box<dyn Produce>) -> ProducerId {
        let id = ProducerId(self.next_producer);
        self.next_producer += 1;
        let name: Arc<str> = Arc::from(producer.name());

        let listener = producer.subscription().map(|sub| {
            if sub.kinds.is_empty() {
                self.dispatcher.subscribe_all(sub.priority, Arc::clone(&sub.listener));
            } else {
                for kind in &sub.kinds {
                    self.dispatcher
                        .subscribe(*kind, sub.priority, Arc::clone(&sub.listener));
                }
            }
            sub.listener
        });

        debug!(target: "spawnd.core.daemon", producer = %name, listens = listener.is_some(), "producer registered");
        self.producers.push(ProducerSlot {
            id,
            name,
            producer,
            listener,
        });
        id
    }

    fn deregister(&mut self, idx: usize) {
        let slot = self.producers.remove(idx);
        if idx < self.cursor {
            self.cursor -= 1;
        }
        if let Some(listener) = &slot.listener {
            self.dispatcher.unsubscribe(listener);
        }
        info!(target: "spawnd.core.daemon", producer = %slot.name, "producer removed");
    }

    /// Polls one producer. `None` means it failed and was deregistered.
    fn poll(&mut self, idx: usize) -> Option<Vec<TaskBox>> {
        let slot = &mut self.producers[idx];
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| slot.producer.produce()));
        match outcome {
            Ok(Ok(produced)) => Some(produced.into_tasks()),
            Ok(Err(e)) => {
                error!(target: "spawnd.core.daemon", producer = %slot.name, error = %e, "producer failed; deregistering");
                self.deregister(idx);
                None
            }
            Err(_) => {
                error!(target: "spawnd.core.daemon", producer = %slot.name, "producer panicked; deregistering");
                self.deregister(idx);
                None
            }
        }
    }

    fn enqueue(&mut self, task: TaskBox, producer: &Arc<str>) {
        let process = Process::new(task)
            .with_producer(Arc::clone(producer))
            .with_max_runtime(self.config.max_child_runtime())
            .with_rlimits(self.config.rlimits.clone());
        self.queue.push_back(process);
    }

    /// Forks queued processes while the live table has room.
    fn start_queued(&mut self) -> usize {
        let mut started = 0;
        while self.live.len() < self.config.max_concurrency {
            let Some(mut process) = self.queue.pop_front() else {
                break;
            };

            match process.fork() {
                Ok(pid) => {
                    info!(target: "spawnd.core.daemon", pid = pid.as_raw(), task = process.task_name(), "spawned child");
                    let ev = self
                        .event(EventKind::ProcessStart)
                        .with_process(&process)
                        .with_live(self.live.len() + 1);
                    self.live.insert(pid.as_raw(), process);
                    self.dispatcher.dispatch(&ev);
                    started += 1;
                }
                Err(e) => {
                    error!(
                        target: "spawnd.core.daemon",
                        task = process.task_name(),
                        label = e.as_label(),
                        error = %e,
                        "failed to start child; dropping"
                    );
                }
            }
        }
        started
    }

    /// Publishes `process.iteration` and reaps every live child once.
    fn reap_live(&mut self) -> usize {
        let pids: Vec<i32> = self.live.keys().copied().collect();
        let mut exited = 0;

        for pid in pids {
            let Some(process) = self.live.get_mut(&pid) else {
                continue;
            };
            let ev = Event::new(EventKind::ProcessIteration)
                .with_daemon(self.id)
                .with_process(process);
            self.dispatcher.dispatch(&ev);

            match process.reap() {
                Ok(Reaped::Running) => {}
                Ok(Reaped::Exited(status)) => {
                    let Some(process) = self.live.remove(&pid) else {
                        continue;
                    };
                    exited += 1;
                    info!(
                        target: "spawnd.core.daemon",
                        pid,
                        task = process.task_name(),
                        exit = %status,
                        runtime_ms = process.runtime().map_or(0, |d| d.as_millis() as u64),
                        "child exited"
                    );
                    let ev = Event::new(EventKind::ProcessExit)
                        .with_daemon(self.id)
                        .with_process(&process)
                        .with_live(self.live.len());
                    self.dispatcher.dispatch(&ev);
                }
                Err(e @ ProcessError::RuntimeExceeded { .. }) => {
                    error!(target: "spawnd.core.daemon", pid, task = process.task_name(), error = %e, "child killed");
                    let ev = Event::new(EventKind::ProcessTimeout)
                        .with_daemon(self.id)
                        .with_process(process)
                        .with_reason(e.to_string());
                    self.dispatcher.dispatch(&ev);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(target: "spawnd.core.daemon", pid, label = e.as_label(), error = %e, "reap failed; retrying next iteration");
                }
                Err(e) => {
                    error!(target: "spawnd.core.daemon", pid, label = e.as_label(), error = %e, "reap failed; dropping child");
                    self.live.remove(&pid);
                }
            }
        }
        exited
    }

    fn interrupt_live(&self) -> usize {
        let mut sent = 0;
        for (pid, process) in &self.live {
            match process.send_signal(Signal::SIGINT) {
                Ok(()) => sent += 1,
                Err(e) => warn!(target: "spawnd.core.daemon", pid, error = %e, "failed to interrupt child"),
            }
        }
        sent
    }
}
