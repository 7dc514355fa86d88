//! # OS signal registry.
//!
//! Maps a signal to an ordered list of listeners. The OS-level handler is
//! installed when the first listener for a signal is added and the default
//! disposition is restored when the last one is removed.
//!
//! ## Handler context
//! The installed handler only raises a flag in a static table, which is
//! async-signal-safe. Listeners never run inside the handler: they run from
//! [`SignalRegistry::dispatch_pending`], which the daemon calls at the top of
//! every loop iteration.
//!
//! ```text
//!  kernel ──► mark_pending(signo) ──► PENDING[signo] = true
//!                                          │
//!  loop top ──► dispatch_pending() ──swap──┘──► call(signal) ──► listener 1, 2, ...
//! ```
//!
//! The pending table is process-wide; keep one registry per process.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use tracing::{debug, error};

use crate::error::CoreError;

/// Upper bound on signal numbers tracked by the pending table (covers Linux RT signals).
const MAX_SIGNAL: usize = 65;

static PENDING: [AtomicBool; MAX_SIGNAL] = [const { AtomicBool::new(false) }; MAX_SIGNAL];

extern "C" fn mark_pending(signo: libc::c_int) {
    if let Some(flag) = usize::try_from(signo).ok().and_then(|i| PENDING.get(i)) {
        flag.store(true, Ordering::SeqCst);
    }
}

#[inline]
fn pending_flag(signal: Signal) -> Option<&'static AtomicBool> {
    PENDING.get(signal as usize)
}

/// Callback invoked with the signal that was delivered.
pub type SignalListener = Arc<dyn Fn(Signal) + Send + Sync>;

/// Handle returned by [`SignalRegistry::add`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct SignalRegistry {
    listeners: HashMap<Signal, Vec<(ListenerId, SignalListener)>>,
    next_id: u64,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` for `signal`, installing the OS handler on first use.
    pub fn add(&mut self, signal: Signal, listener: SignalListener) -> Result<ListenerId, CoreError> {
        if !self.listeners.contains_key(&signal) {
            install(signal)?;
            debug!(target: "spawnd.core.signals", signal = ?signal, "handler installed");
        }

        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(signal).or_default().push((id, listener));
        Ok(id)
    }

    /// Removes one listener. Restores the default disposition once `signal` has none left.
    ///
    /// Returns `Ok(false)` if `id` was not registered for `signal`.
    pub fn remove(&mut self, signal: Signal, id: ListenerId) -> Result<bool, CoreError> {
        let Some(set) = self.listeners.get_mut(&signal) else {
            return Ok(false);
        };
        let before = set.len();
        set.retain(|(lid, _)| *lid != id);
        if set.len() == before {
            return Ok(false);
        }

        if set.is_empty() {
            self.listeners.remove(&signal);
            restore_default(signal)?;
            debug!(target: "spawnd.core.signals", signal = ?signal, "default disposition restored");
        }
        Ok(true)
    }

    /// Invokes every listener for `signal` in registration order; returns how many ran.
    ///
    /// A panicking listener is logged and does not stop the others.
    pub fn call(&self, signal: Signal) -> usize {
        let Some(set) = self.listeners.get(&signal) else {
            return 0;
        };
        for (_, listener) in set {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(signal))).is_err() {
                error!(target: "spawnd.core.signals", signal = ?signal, "signal listener panicked");
            }
        }
        set.len()
    }

    /// Runs listeners for every signal delivered since the last call.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        for signal in self.listeners.keys() {
            let fired = pending_flag(*signal).is_some_and(|f| f.swap(false, Ordering::SeqCst));
            if fired {
                debug!(target: "spawnd.core.signals", signal = ?signal, "signal received");
                self.call(*signal);
                delivered += 1;
            }
        }
        delivered
    }

    #[inline]
    pub fn is_installed(&self, signal: Signal) -> bool {
        self.listeners.contains_key(&signal)
    }

    pub fn listener_count(&self, signal: Signal) -> usize {
        self.listeners.get(&signal).map_or(0, Vec::len)
    }
}

impl Drop for SignalRegistry {
    fn drop(&mut self) {
        for signal in self.listeners.keys() {
            if let Err(e) = restore_default(*signal) {
                error!(target: "spawnd.core.signals", error = %e, "failed to restore disposition");
            }
        }
    }
}

fn install(signal: Signal) -> Result<(), CoreError> {
    if let Some(flag) = pending_flag(signal) {
        flag.store(false, Ordering::SeqCst);
    }
    let action = SigAction::new(
        SigHandler::Handler(mark_pending),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // SAFETY: the handler only stores into a static atomic.
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .map_err(|source| CoreError::Signal { signal, source })
}

fn restore_default(signal: Signal) -> Result<(), CoreError> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    // SAFETY: restoring SIG_DFL installs no Rust code.
    unsafe { sigaction(signal, &action) }
        .map(drop)
        .map_err(|source| CoreError::Signal { signal, source })?;
    if let Some(flag) = pending_flag(signal) {
        flag.store(false, Ordering::SeqCst);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use nix::sys::signal::raise;

    fn counter(hits: &Arc<AtomicUsize>) -> SignalListener {
        let hits = Arc::clone(hits);
        Arc::new(move |_: Signal| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn current_handler(signal: Signal) -> SigHandler {
        let probe = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        let previous = unsafe { sigaction(signal, &probe) }.unwrap();
        unsafe { sigaction(signal, &previous) }.unwrap();
        previous.handler()
    }

    // Signals below default to "ignore", so a delivery after restore is harmless.

    #[test]
    fn removing_one_listener_keeps_the_other() {
        let sig = Signal::SIGWINCH;
        let (a, b) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
        let mut reg = SignalRegistry::new();

        let id_a = reg.add(sig, counter(&a)).unwrap();
        let id_b = reg.add(sig, counter(&b)).unwrap();
        assert!(reg.is_installed(sig));
        assert!(matches!(current_handler(sig), SigHandler::Handler(_)));

        raise(sig).unwrap();
        assert_eq!(reg.dispatch_pending(), 1);
        assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (1, 1));

        assert!(reg.remove(sig, id_a).unwrap());
        assert!(reg.is_installed(sig));
        raise(sig).unwrap();
        reg.dispatch_pending();
        assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (1, 2));

        assert!(reg.remove(sig, id_b).unwrap());
        assert!(!reg.is_installed(sig));
        assert!(matches!(current_handler(sig), SigHandler::SigDfl));

        raise(sig).unwrap();
        assert_eq!(reg.dispatch_pending(), 0);
        assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (1, 2));
    }

    #[test]
    fn call_runs_in_registration_order_and_survives_panics() {
        let sig = Signal::SIGURG;
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut reg = SignalRegistry::new();

        for tag in 0..3 {
            let order = Arc::clone(&order);
            reg.add(
                sig,
                Arc::new(move |_: Signal| {
                    order.lock().unwrap().push(tag);
                    if tag == 1 {
                        panic!("signal listener boom");
                    }
                }),
            )
            .unwrap();
        }

        assert_eq!(reg.call(sig), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(reg.listener_count(sig), 3);
    }

    #[test]
    fn unknown_removal_is_false() {
        let mut reg = SignalRegistry::new();
        assert!(!reg.remove(Signal::SIGCHLD, ListenerId(99)).unwrap());
        assert_eq!(reg.call(Signal::SIGCHLD), 0);
        assert_eq!(reg.dispatch_pending(), 0);
    }

    #[test]
    fn uncatchable_signal_is_rejected() {
        let mut reg = SignalRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let err = reg.add(Signal::SIGKILL, counter(&hits)).unwrap_err();
        assert!(matches!(err, CoreError::Signal { signal: Signal::SIGKILL, .. }));
        assert!(!reg.is_installed(Signal::SIGKILL));
    }
}
