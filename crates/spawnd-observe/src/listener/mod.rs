mod view;
pub use view::{View, level_for, log_event, message_for};

use spawnd_core::{Event, Listen, ListenerError};

/// Logs every lifecycle event with a per-kind level and message.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl Listen for Journal {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        log_event(event);
        Ok(())
    }

    fn name(&self) -> &str {
        "journal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use spawnd_core::{EventDispatcher, EventKind};

    #[test]
    fn journal_accepts_every_kind() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe_all(0, Arc::new(Journal::new()));

        for kind in EventKind::ALL {
            assert_eq!(dispatcher.dispatch(&Event::new(kind)), 1);
        }
        assert_eq!(Journal.name(), "journal");
    }
}
