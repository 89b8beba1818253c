/// Close codes the voice server may end a signaling session with.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum CloseCode {
    /// An invalid opcode was sent.
    UnknownOpcode,
    /// An invalid payload was sent.
    FailedToDecode,
    /// A payload was sent before identifying.
    NotAuthenticated,
    /// The token sent with Identify was incorrect.
    AuthenticationFailed,
    /// More than one Identify was sent.
    AlreadyAuthenticated,
    /// The session is no longer valid.
    SessionInvalid,
    /// The session has timed out.
    SessionTimeout,
    /// The requested voice server could not be found.
    ServerNotFound,
    /// The protocol sent in SelectProtocol was unknown.
    UnknownProtocol,
    /// Disconnected by the server: kicked, channel deleted, or moved elsewhere.
    Disconnected,
    /// The voice server crashed.
    VoiceServerCrash,
    /// The encryption mode sent in SelectProtocol was unknown.
    UnknownEncryptionMode,
}

impl CloseCode {
    /// Parses a websocket close code, returning `None` if it is not voice-specific.
    pub fn from_u16(code: u16) -> Option<Self> {
        use CloseCode::*;
        Some(match code {
            4001 => UnknownOpcode,
            4002 => FailedToDecode,
            4003 => NotAuthenticated,
            4004 => AuthenticationFailed,
            4005 => AlreadyAuthenticated,
            4006 => SessionInvalid,
            4009 => SessionTimeout,
            4011 => ServerNotFound,
            4012 => UnknownProtocol,
            4014 => Disconnected,
            4015 => VoiceServerCrash,
            4016 => UnknownEncryptionMode,
            _ => return None,
        })
    }

    /// Whether a fresh handshake with the same credentials may succeed.
    ///
    /// Rejected credentials, invalidated sessions and forced disconnects need new
    /// credentials from the main gateway instead.
    pub fn should_reconnect(self) -> bool {
        !matches!(
            self,
            CloseCode::AuthenticationFailed | CloseCode::SessionInvalid | CloseCode::Disconnected
        )
    }
}
