use std::borrow::Cow;

use crate::{dispatch::Event, error::ListenerError};

/// Contract for lifecycle event listeners.
///
/// Called synchronously from the daemon loop, so implementations should return
/// quickly. An `Err` or a panic is logged and does not stop delivery to the
/// remaining listeners.
pub trait Listen: Send + Sync + 'static {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning a closure into a [`Listen`] implementation.
pub struct ListenFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> ListenFn<F>
where
    F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Listen for ListenFn<F>
where
    F: Fn(&Event) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
