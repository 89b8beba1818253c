pub mod data;
pub(crate) mod internal_data;

use super::CoreEvent;
use crate::model::payload::{ClientDisconnect, Speaking};
pub use data as context_data;
use data::*;
use internal_data::*;

/// Information about the connection or call change which fired an event.
#[derive(Debug)]
#[non_exhaustive]
pub enum EventContext<'a> {
    /// Speaking state update, typically describing how another voice
    /// user is transmitting audio data. Clients must send at least one such
    /// packet to allow SSRC/UserID matching.
    SpeakingStateUpdate(&'a Speaking),
    /// Fired whenever a client disconnects.
    ClientDisconnect(ClientDisconnect),
    /// Fires when this driver successfully connects to a voice channel.
    DriverConnect(ConnectData<'a>),
    /// Fires when a live connection has failed, and reconnection is starting.
    DriverReconnecting(DisconnectData<'a>),
    /// Fires when this driver successfully reconnects after a network error.
    DriverReconnect(ConnectData<'a>),
    /// Fires when this driver fails to connect to, or drops from, a voice channel.
    DriverDisconnect(DisconnectData<'a>),
}

#[derive(Debug)]
pub enum CoreContext {
    SpeakingStateUpdate(Speaking),
    ClientDisconnect(ClientDisconnect),
    DriverConnect(InternalConnect),
    DriverReconnecting(InternalDisconnect),
    DriverReconnect(InternalConnect),
    DriverDisconnect(InternalDisconnect),
}

impl<'a> CoreContext {
    pub(crate) fn to_user_context(&'a self) -> EventContext<'a> {
        match self {
            Self::SpeakingStateUpdate(evt) => EventContext::SpeakingStateUpdate(evt),
            Self::ClientDisconnect(evt) => EventContext::ClientDisconnect(*evt),
            Self::DriverConnect(evt) => EventContext::DriverConnect(ConnectData::from(evt)),
            Self::DriverReconnecting(evt) =>
                EventContext::DriverReconnecting(DisconnectData::from(evt)),
            Self::DriverReconnect(evt) => EventContext::DriverReconnect(ConnectData::from(evt)),
            Self::DriverDisconnect(evt) =>
                EventContext::DriverDisconnect(DisconnectData::from(evt)),
        }
    }

    pub(crate) fn to_core_event(&self) -> CoreEvent {
        match self {
            Self::SpeakingStateUpdate(_) => CoreEvent::SpeakingStateUpdate,
            Self::ClientDisconnect(_) => CoreEvent::ClientDisconnect,
            Self::DriverConnect(_) => CoreEvent::DriverConnect,
            Self::DriverReconnecting(_) => CoreEvent::DriverReconnecting,
            Self::DriverReconnect(_) => CoreEvent::DriverReconnect,
            Self::DriverDisconnect(_) => CoreEvent::DriverDisconnect,
        }
    }
}

impl EventContext<'_> {
    /// Retrieve the event class for an event (i.e., when matching
    /// an event against the registered listeners).
    #[must_use]
    pub fn to_core_event(&self) -> CoreEvent {
        match self {
            Self::SpeakingStateUpdate(_) => CoreEvent::SpeakingStateUpdate,
            Self::ClientDisconnect(_) => CoreEvent::ClientDisconnect,
            Self::DriverConnect(_) => CoreEvent::DriverConnect,
            Self::DriverReconnecting(_) => CoreEvent::DriverReconnecting,
            Self::DriverReconnect(_) => CoreEvent::DriverReconnect,
            Self::DriverDisconnect(_) => CoreEvent::DriverDisconnect,
        }
    }
}
