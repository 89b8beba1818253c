/// Voice core events occur on lifecycle transitions of the connection and on
/// receipt of call signalling.
///
/// Core events persist while the handler's `act` method does not return
/// [`Event::Cancel`].
///
/// ## Events from other users
/// The driver can observe when a user *speaks for the first time* ([`SpeakingStateUpdate`]),
/// and when a client leaves the session ([`ClientDisconnect`]).
///
/// To obtain a user's SSRC, you must use [`SpeakingStateUpdate`] events.
///
/// [`Event::Cancel`]: super::Event::Cancel
/// [`SpeakingStateUpdate`]: Self::SpeakingStateUpdate
/// [`ClientDisconnect`]: Self::ClientDisconnect
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum CoreEvent {
    /// Speaking state update from the WS gateway, typically describing how another voice
    /// user is transmitting audio data. Clients must send at least one such
    /// packet to allow SSRC/UserID matching.
    SpeakingStateUpdate,

    /// Fires whenever a user disconnects from the same stream as the bot.
    ClientDisconnect,

    /// Fires when this driver successfully connects to a voice channel.
    DriverConnect,

    /// Fires when a live connection fails and the driver begins to reconnect.
    DriverReconnecting,

    /// Fires when this driver successfully reconnects after a network error.
    DriverReconnect,

    /// Fires when this driver fails to connect to, or drops from, a voice channel.
    DriverDisconnect,
}
