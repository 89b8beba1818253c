//! Connection errors and convenience types.

use crate::{
    driver::{
        crypto::Error as CryptoError,
        tasks::{
            error::{Error as TaskError, Recipient},
            message::*,
        },
    },
    model::{CloseCode, Opcode},
    ws::Error as WsError,
};
use flume::SendError;
use serde_json::Error as JsonError;
use std::{error::Error as StdError, fmt, io::Error as IoError};
use tokio::time::error::Elapsed;

/// Errors encountered while connecting to a Discord voice server over the driver.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The driver hung up an internal signaller, either due to another connection attempt
    /// or a crash.
    AttemptDiscarded,
    /// The driver has been closed, and accepts no further connections.
    Closed,
    /// The connection info did not name a voice channel to join.
    NoChannel,
    /// The session key sent by the server was unusable.
    Crypto(CryptoError),
    /// Server did not return the expected crypto mode during negotiation.
    CryptoModeInvalid,
    /// Selected crypto mode was not offered by server.
    CryptoModeUnavailable,
    /// An indicator that an endpoint URL was invalid.
    EndpointUrl,
    /// The server's Hello carried an unusable heartbeat interval.
    IllegalHeartbeatInterval,
    /// Discord failed to correctly respond to IP discovery.
    IllegalDiscoveryResponse,
    /// Could not parse Discord's view of our IP.
    IllegalIp,
    /// Miscellaneous I/O error.
    Io(IoError),
    /// JSON (de)serialization error.
    Json(JsonError),
    /// Failed to message other background tasks during connection establishment.
    InterconnectFailure(Recipient),
    /// The server sent a handshake reply out of turn.
    UnexpectedOpcode {
        /// The reply the current handshake step waits on.
        expected: Opcode,
        /// The reply which arrived instead.
        seen: Opcode,
    },
    /// The server closed the signaling channel with a voice close code.
    ///
    /// If `resumable` is false, new credentials must be fetched from the main
    /// gateway before connecting again.
    SessionInvalidated {
        /// Close code sent by the server.
        code: CloseCode,
        /// Whether a fresh handshake with the same credentials may succeed.
        resumable: bool,
    },
    /// Error communicating with gateway server over WebSocket.
    Ws(WsError),
    /// Connection attempt timed out.
    TimedOut,
}

impl Error {
    /// Whether a later attempt with the same [`ConnectionInfo`] may succeed.
    ///
    /// [`ConnectionInfo`]: crate::ConnectionInfo
    pub(crate) fn should_retry(&self) -> bool {
        !matches!(
            self,
            Error::Closed
                | Error::NoChannel
                | Error::EndpointUrl
                | Error::SessionInvalidated {
                    resumable: false,
                    ..
                }
        )
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        Error::Crypto(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        Error::Io(e)
    }
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Error {
        Error::Json(e)
    }
}

impl From<TaskError> for Error {
    fn from(e: TaskError) -> Error {
        match e {
            TaskError::InterconnectFailure(r) => Error::InterconnectFailure(r),
            TaskError::Io(e) => Error::Io(e),
            TaskError::Json(e) => Error::Json(e),
            TaskError::SessionInvalidated { code, resumable } =>
                Error::SessionInvalidated { code, resumable },
            TaskError::Ws(e) => Error::Ws(e),
        }
    }
}

impl From<WsError> for Error {
    fn from(e: WsError) -> Error {
        TaskError::from(e).into()
    }
}

impl From<SendError<WsMessage>> for Error {
    fn from(_e: SendError<WsMessage>) -> Error {
        Error::InterconnectFailure(Recipient::AuxNetwork)
    }
}

impl From<SendError<SenderMessage>> for Error {
    fn from(_e: SendError<SenderMessage>) -> Error {
        Error::InterconnectFailure(Recipient::Sender)
    }
}

impl From<Elapsed> for Error {
    fn from(_e: Elapsed) -> Error {
        Error::TimedOut
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to connect to Discord RTP server: ")?;
        use Error::*;
        match self {
            AttemptDiscarded => write!(f, "connection attempt was aborted/discarded"),
            Closed => write!(f, "driver has been closed"),
            NoChannel => write!(f, "no voice channel was given to join"),
            Crypto(e) => e.fmt(f),
            CryptoModeInvalid => write!(f, "server changed negotiated encryption mode"),
            CryptoModeUnavailable => write!(f, "server did not offer chosen encryption mode"),
            EndpointUrl => write!(f, "endpoint URL received from gateway was invalid"),
            IllegalHeartbeatInterval => write!(f, "server sent an unusable heartbeat interval"),
            IllegalDiscoveryResponse => write!(f, "IP discovery/NAT punching response was invalid"),
            IllegalIp => write!(f, "IP discovery/NAT punching response had bad IP value"),
            Io(e) => e.fmt(f),
            Json(e) => e.fmt(f),
            InterconnectFailure(e) => write!(f, "failed to contact other task ({e:?})"),
            UnexpectedOpcode { expected, seen } =>
                write!(f, "expected {expected} during handshake, received {seen}"),
            SessionInvalidated { code, resumable } => write!(
                f,
                "session closed by server ({code:?}, {})",
                if *resumable { "resumable" } else { "not resumable" }
            ),
            Ws(e) => write!(f, "websocket issue ({e})."),
            TimedOut => write!(f, "connection attempt timed out"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Crypto(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Ws(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenience type for Discord voice/driver connection error handling.
pub type Result<T> = std::result::Result<T, Error>;
