use std::fmt;

/// Lifecycle of a [`Driver`]'s voice session.
///
/// [`Driver`]: super::Driver
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ConnectionState {
    /// No session is live, and none is being established.
    #[default]
    Disconnected,
    /// A handshake is in flight.
    Connecting,
    /// The session is live: heartbeats and audio are flowing.
    Connected,
    /// A live session failed, and the driver is waiting to retry.
    Reconnecting,
    /// The driver was closed, and will not connect again.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A snapshot of a driver's connection, as published by its background task.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct Status {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// SSRC assigned to the live session, if any.
    pub ssrc: Option<u32>,
}
