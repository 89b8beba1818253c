use super::message::*;
use crate::{
    model::CloseCode as VoiceCloseCode,
    ws::Error as WsError,
};
use flume::SendError;
use serde_json::Error as JsonError;
use std::{
    error::Error as StdError,
    fmt,
    io::{Error as IoError, ErrorKind as IoErrorKind},
};
use tokio_tungstenite::tungstenite::{protocol::frame::coding::CloseCode, Error as TungsteniteError};

/// The background task which could not be contacted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Recipient {
    /// The signaling websocket writer.
    AuxNetwork,
    /// The paced audio sender.
    Sender,
    /// The owner of a connection's event stream.
    Supervisor,
    /// The UDP receiver.
    UdpRx,
    /// The UDP socket writer.
    UdpTx,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fatal failures of a running connection's tasks.
///
/// Any of these ends the connection they occur on; the supervisor then decides,
/// via [`Error::should_reconnect`], whether to start a fresh session.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    InterconnectFailure(Recipient),
    Io(IoError),
    Json(JsonError),
    /// The voice server ended the session with a voice-specific close code.
    SessionInvalidated {
        code: VoiceCloseCode,
        resumable: bool,
    },
    Ws(WsError),
}

impl Error {
    pub(crate) fn should_reconnect(&self) -> bool {
        !matches!(
            self,
            Error::SessionInvalidated {
                resumable: false,
                ..
            }
        )
    }

    /// Whether this is the socket going away underneath a task, rather than a
    /// fault in what was sent or received.
    pub(crate) fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Ws(
                    WsError::WsClosed(_)
                        | WsError::Ws(
                            TungsteniteError::Io(_)
                                | TungsteniteError::ConnectionClosed
                                | TungsteniteError::AlreadyClosed
                        )
                )
        )
    }

    // A full socket buffer costs one packet, not the whole session.
    pub(crate) fn disarm_would_block(self) -> Result<()> {
        match self {
            Self::Io(i) if i.kind() == IoErrorKind::WouldBlock => Ok(()),
            e => Err(e),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InterconnectFailure(r) => write!(f, "failed to contact other task ({r:?})"),
            Error::Io(e) => write!(f, "socket failure: {e}"),
            Error::Json(e) => write!(f, "malformed payload body: {e}"),
            Error::SessionInvalidated { code, resumable } => write!(
                f,
                "session closed by server ({code:?}, {})",
                if *resumable { "resumable" } else { "not resumable" }
            ),
            Error::Ws(e) => e.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Ws(e) => Some(e),
            _ => None,
        }
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

impl From<WsError> for Error {
    fn from(e: WsError) -> Error {
        if let WsError::WsClosed(Some(frame)) = &e {
            if let CloseCode::Library(l) = frame.code {
                if let Some(code) = VoiceCloseCode::from_u16(l) {
                    return Error::SessionInvalidated {
                        code,
                        resumable: code.should_reconnect(),
                    };
                }
            }
        }

        Error::Ws(e)
    }
}

impl From<SendError<WsMessage>> for Error {
    fn from(_e: SendError<WsMessage>) -> Error {
        Error::InterconnectFailure(Recipient::AuxNetwork)
    }
}

impl From<SendError<UdpTxMessage>> for Error {
    fn from(_e: SendError<UdpTxMessage>) -> Error {
        Error::InterconnectFailure(Recipient::UdpTx)
    }
}

impl From<SendError<ConnEvent>> for Error {
    fn from(_e: SendError<ConnEvent>) -> Error {
        Error::InterconnectFailure(Recipient::Supervisor)
    }
}
