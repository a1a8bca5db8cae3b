//! Event registry: event name → ordered handler list.

use std::collections::HashMap;

use crate::handler::BoxedEventHandler;

/// Name of the event fired for every dispatched chat message.
pub const MESSAGE_EVENT: &str = "message";

/// Holds the handlers of every event name in registration order.
#[derive(Default, Clone)]
pub struct EventRegistry {
    events: HashMap<String, Vec<BoxedEventHandler>>,
}

impl EventRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `name`. Never fails.
    pub fn register(&mut self, name: impl Into<String>, handler: BoxedEventHandler) {
        self.events.entry(name.into()).or_default().push(handler);
    }

    /// A snapshot of the handlers for `name`, in registration order.
    ///
    /// Unknown names yield an empty list.
    pub fn handlers(&self, name: &str) -> Vec<BoxedEventHandler> {
        self.events.get(name).cloned().unwrap_or_default()
    }

    /// Number of handlers registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.events.get(name).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .events
            .iter()
            .map(|(name, handlers)| (name.as_str(), handlers.len()))
            .collect();
        f.debug_struct("EventRegistry")
            .field("events", &counts)
            .finish()
    }
}
