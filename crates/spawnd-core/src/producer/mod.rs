//! # Work sources polled by the daemon.
//!
//! A [`Produce`] implementation is asked for work once per fairness pass and
//! answers with a [`Produced`] value: nothing, one task, or a batch. Returning
//! `Err` (or panicking) gets the producer deregistered; the daemon keeps running.
//!
//! A producer can also listen to lifecycle events by returning a
//! [`Subscription`]; the daemon subscribes it on registration and unsubscribes
//! it on removal.

use std::borrow::Cow;
use std::sync::Arc;

use spawnd_exec::TaskBox;

use crate::dispatch::{EventKind, Listen};
use crate::error::ProducerError;

/// Handle returned by the daemon on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProducerId(pub(crate) u64);

/// Result of one poll.
pub enum Produced {
    Empty,
    Single(TaskBox),
    Many(Vec<TaskBox>),
}

impl Produced {
    pub fn len(&self) -> usize {
        match self {
            Produced::Empty => 0,
            Produced::Single(_) => 1,
            Produced::Many(tasks) => tasks.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_tasks(self) -> Vec<TaskBox> {
        match self {
            Produced::Empty => Vec::new(),
            Produced::Single(task) => vec![task],
            Produced::Many(tasks) => tasks,
        }
    }
}

impl From<TaskBox> for Produced {
    fn from(task: TaskBox) -> Self {
        Produced::Single(task)
    }
}

impl From<Option<TaskBox>> for Produced {
    fn from(task: Option<TaskBox>) -> Self {
        task.map_or(Produced::Empty, Produced::Single)
    }
}

impl From<Vec<TaskBox>> for Produced {
    fn from(tasks: Vec<TaskBox>) -> Self {
        Produced::Many(tasks)
    }
}

/// Event-listener capability of a producer.
pub struct Subscription {
    pub listener: Arc<dyn Listen>,
    /// Kinds to receive; empty means every kind.
    pub kinds: Vec<EventKind>,
    pub priority: i32,
}

impl Subscription {
    /// Subscribes `listener` to every kind at priority 0.
    pub fn all(listener: Arc<dyn Listen>) -> Self {
        Self {
            listener,
            kinds: Vec::new(),
            priority: 0,
        }
    }
}

pub trait Produce {
    /// Human-readable name (for logs and events).
    fn name(&self) -> &str {
        "producer"
    }

    /// Called at most once per fairness pass; must not block.
    fn produce(&mut self) -> Result<Produced, ProducerError>;

    fn subscription(&self) -> Option<Subscription> {
        None
    }
}

/// Adapter for a bare closure returning [`Produced`].
///
/// Built once at registration time.
pub struct ProducerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ProducerFn<F>
where
    F: FnMut() -> Produced,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Produce for ProducerFn<F>
where
    F: FnMut() -> Produced,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&mut self) -> Result<Produced, ProducerError> {
        Ok((self.f)())
    }
}
