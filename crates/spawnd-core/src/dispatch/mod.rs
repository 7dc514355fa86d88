//! # Synchronous, priority-ordered event bus.
//!
//! [`EventDispatcher`] delivers each [`Event`] to every listener registered for
//! its [`EventKind`] (or for all kinds), in descending priority; listeners with
//! equal priority run in registration order.
//!
//! ## Isolation
//! - A listener returning `Err` is logged; delivery continues.
//! - A listener panic is caught and logged; delivery continues.
//!
//! ```text
//!   dispatch(&Event)
//!       │   (sorted: priority desc, then registration seq)
//!       ├──► listener p=10 ─► on_event()
//!       ├──► listener p=0  ─► on_event()   ← Err / panic logged, not propagated
//!       └──► listener p=0  ─► on_event()
//! ```

use std::cmp::Reverse;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, warn};

mod event;
pub use event::{Event, EventKind};

mod listen;
pub use listen::{Listen, ListenFn};

struct Entry {
    /// `None` subscribes to every kind.
    kind: Option<EventKind>,
    priority: i32,
    seq: u64,
    listener: Arc<dyn Listen>,
}

impl Entry {
    #[inline]
    fn accepts(&self, kind: EventKind) -> bool {
        self.kind.is_none_or(|k| k == kind)
    }
}

/// Listener table owned by the daemon.
#[derive(Default)]
pub struct EventDispatcher {
    entries: Vec<Entry>,
    next_seq: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `kind`.
    ///
    /// Returns `false` (and changes nothing) if the same listener is already
    /// registered for that kind.
    pub fn subscribe(&mut self, kind: EventKind, priority: i32, listener: Arc<dyn Listen>) -> bool {
        self.insert(Some(kind), priority, listener)
    }

    /// Registers `listener` for every kind.
    pub fn subscribe_all(&mut self, priority: i32, listener: Arc<dyn Listen>) -> bool {
        self.insert(None, priority, listener)
    }

    /// Removes every registration of `listener`; returns how many were removed.
    pub fn unsubscribe(&mut self, listener: &Arc<dyn Listen>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !same_listener(&e.listener, listener));
        before - self.entries.len()
    }

    /// Delivers `event` to matching listeners; returns how many were invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        let mut invoked = 0;
        for entry in self.entries.iter().filter(|e| e.accepts(event.kind)) {
            invoked += 1;
            let listener = &entry.listener;
            match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    target: "spawnd.core.dispatch",
                    listener = listener.name(),
                    event = event.kind.as_str(),
                    error = %e,
                    "listener failed"
                ),
                Err(_) => error!(
                    target: "spawnd.core.dispatch",
                    listener = listener.name(),
                    event = event.kind.as_str(),
                    "listener panicked"
                ),
            }
        }
        invoked
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.entries.iter().any(|e| e.accepts(kind))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, kind: Option<EventKind>, priority: i32, listener: Arc<dyn Listen>) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|e| e.kind == kind && same_listener(&e.listener, &listener));
        if duplicate {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry {
            kind,
            priority,
            seq,
            listener,
        });
        self.entries.sort_by_key(|e| (Reverse(e.priority), e.seq));
        true
    }
}

/// Identity comparison on the data pointer; vtable pointers may differ across codegen units.
#[inline]
fn same_listener(a: &Arc<dyn Listen>, b: &Arc<dyn Listen>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use crate::error::ListenerError;

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Listen for Recorder {
        fn on_event(&self, _event: &Event) -> Result<(), ListenerError> {
            self.log.lock().unwrap().push(self.tag);
            Ok(())
        }
    }

    fn recorder(tag: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn Listen> {
        Arc::new(Recorder {
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn priority_then_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = EventDispatcher::new();

        d.subscribe(EventKind::ProcessExit, 0, recorder("low-a", &log));
        d.subscribe(EventKind::ProcessExit, 10, recorder("high", &log));
        d.subscribe(EventKind::ProcessExit, 0, recorder("low-b", &log));
        d.subscribe_all(5, recorder("all", &log));
        d.subscribe(EventKind::ProcessStart, 100, recorder("other-kind", &log));

        let invoked = d.dispatch(&Event::new(EventKind::ProcessExit));

        assert_eq!(invoked, 4);
        assert_eq!(*log.lock().unwrap(), vec!["high", "all", "low-a", "low-b"]);
    }

    #[test]
    fn failing_and_panicking_listeners_are_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = EventDispatcher::new();

        d.subscribe(
            EventKind::DaemonIteration,
            3,
            Arc::new(ListenFn::new("fails", |_: &Event| Err(ListenerError::new("nope")))),
        );
        d.subscribe(
            EventKind::DaemonIteration,
            2,
            Arc::new(ListenFn::new("panics", |_: &Event| -> Result<(), ListenerError> {
                panic!("listener boom")
            })),
        );
        d.subscribe(EventKind::DaemonIteration, 1, recorder("survivor", &log));

        assert_eq!(d.dispatch(&Event::new(EventKind::DaemonIteration)), 3);
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn duplicate_subscribe_is_noop_and_unsubscribe_removes_all_kinds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = EventDispatcher::new();
        let l = recorder("x", &log);

        assert!(d.subscribe(EventKind::ProcessStart, 0, Arc::clone(&l)));
        assert!(!d.subscribe(EventKind::ProcessStart, 7, Arc::clone(&l)));
        assert!(d.subscribe(EventKind::ProcessExit, 0, Arc::clone(&l)));
        assert_eq!(d.len(), 2);

        assert_eq!(d.unsubscribe(&l), 2);
        assert!(d.is_empty());
        assert_eq!(d.unsubscribe(&l), 0);
        assert_eq!(d.dispatch(&Event::new(EventKind::ProcessStart)), 0);
    }

    #[test]
    fn has_listeners_honours_catch_all() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut d = EventDispatcher::new();
        assert!(!d.has_listeners(EventKind::DaemonStop));

        d.subscribe_all(0, recorder("all", &log));
        assert!(EventKind::ALL.iter().all(|k| d.has_listeners(*k)));
    }
}
