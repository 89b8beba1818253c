#![allow(missing_docs)]

use crate::events::{CoreContext, EventData};

#[derive(Debug)]
pub enum EventMessage {
    AddGlobalEvent(EventData),
    FireCoreEvent(CoreContext),
    RemoveGlobalEvents,

    Poison,
}
