use super::{context::EventContext, CoreEvent, Event, EventHandler};
use std::{collections::HashMap, fmt};
use tracing::{info, warn};

/// Internal representation of an event handler, and the class it listens for.
pub struct EventData {
    event: Event,
    action: Box<dyn EventHandler>,
}

impl EventData {
    /// Create a representation of an event and its associated handler.
    ///
    /// An event handler, `action`, receives an [`EventContext`] and optionally
    /// produces [`Event::Cancel`] to remove itself.
    pub fn new<F: EventHandler + 'static>(event: Event, action: F) -> Self {
        Self {
            event,
            action: Box::new(action),
        }
    }
}

impl fmt::Debug for EventData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventData")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Storage for all handlers attached to a driver.
#[derive(Debug, Default)]
pub(crate) struct GlobalEvents {
    handlers: HashMap<CoreEvent, Vec<EventData>>,
}

impl GlobalEvents {
    pub(crate) fn add_event(&mut self, data: EventData) {
        match data.event {
            Event::Core(evt) => {
                info!("Global handler added for {:?}.", evt);
                self.handlers.entry(evt).or_default().push(data);
            },
            Event::Cancel => warn!("Ignoring handler registered against `Event::Cancel`."),
        }
    }

    pub(crate) fn remove_handlers(&mut self) {
        self.handlers.clear();
    }

    #[cfg(test)]
    pub(crate) fn handler_count(&self, evt: CoreEvent) -> usize {
        self.handlers.get(&evt).map_or(0, Vec::len)
    }

    /// Runs every handler for `evt`, dropping those which cancel themselves.
    pub(crate) async fn fire_core_event(&mut self, evt: CoreEvent, ctx: EventContext<'_>) {
        let Some(handlers) = self.handlers.get_mut(&evt) else {
            return;
        };

        let mut i = 0;
        while i < handlers.len() {
            if handlers[i].action.act(&ctx).await == Some(Event::Cancel) {
                handlers.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }
}
