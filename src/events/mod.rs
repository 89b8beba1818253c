//! Events relating to the lifecycle of a voice connection, and to other users
//! in the call.
//!
//! Handlers are attached with [`Driver::add_global_event`], and are kept until
//! they return [`Event::Cancel`].
//!
//! [`Driver::add_global_event`]: crate::Driver::add_global_event

mod context;
mod core;
mod store;

pub use self::{
    context::{context_data, EventContext},
    core::CoreEvent,
    store::*,
};
pub(crate) use context::{internal_data, CoreContext};

use async_trait::async_trait;

/// Classes of event which handlers may be registered against.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Event {
    /// A voice connection or call event.
    Core(CoreEvent),
    /// Returned by a handler to remove itself.
    ///
    /// Registering a handler against this class does nothing.
    Cancel,
}

impl From<CoreEvent> for Event {
    fn from(evt: CoreEvent) -> Self {
        Event::Core(evt)
    }
}

/// Trait to handle an event which can be fired by a voice driver.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Respond to one received event.
    ///
    /// Returning `Some(Event::Cancel)` removes this handler; any other
    /// value keeps it registered.
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event>;
}
