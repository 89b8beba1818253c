use crate::{error::JsonError, model::Payload};

use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt,
    StreamExt,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    tungstenite::{
        error::Error as TungsteniteError,
        protocol::{CloseFrame, WebSocketConfig as Config},
        Message,
    },
    MaybeTlsStream,
    WebSocketStream,
};
use tracing::{debug, instrument};
use url::Url;

type Inner = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsStream(Inner);

impl WsStream {
    #[instrument]
    pub(crate) async fn connect(url: Url) -> Result<Self> {
        let (stream, _) = tokio_tungstenite::connect_async_with_config(
            url.as_str(),
            Some(Config {
                max_message_size: None,
                max_frame_size: None,
                ..Default::default()
            }),
            true,
        )
        .await?;

        Ok(Self(stream))
    }

    /// Splits the stream so that reads and writes may live in separate tasks.
    pub(crate) fn split(self) -> (WsSink, WsReader) {
        let (sink, stream) = self.0.split();
        (WsSink(sink), WsReader(stream))
    }
}

/// Write half of the signaling websocket.
pub(crate) struct WsSink(SplitSink<Inner, Message>);

impl WsSink {
    pub(crate) async fn send_json(&mut self, value: &Payload) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.0.send(Message::Text(text)).await?;

        Ok(())
    }

    pub(crate) async fn close(&mut self, frame: Option<CloseFrame<'static>>) -> Result<()> {
        self.0.send(Message::Close(frame)).await?;
        self.0.close().await?;

        Ok(())
    }
}

/// Read half of the signaling websocket.
pub(crate) struct WsReader(SplitStream<Inner>);

impl WsReader {
    /// Waits for the next control message.
    ///
    /// `Ok(None)` is returned for transport-level frames (pings, pongs) which carry no payload.
    /// The end of the stream is reported as a closure.
    pub(crate) async fn recv_json(&mut self) -> Result<Option<Payload>> {
        match self.0.next().await {
            Some(Ok(msg)) => convert_ws_message(msg),
            Some(Err(e)) => Err(e.into()),
            None => Err(Error::WsClosed(None)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the signaling websocket's transport or framing.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A text frame did not hold a valid control payload.
    Json(JsonError),

    /// The discord voice gateway does not support or offer zlib compression.
    /// As a result, only text messages are expected.
    UnexpectedBinaryMessage(Vec<u8>),

    /// The websocket library failed to read or write.
    Ws(TungsteniteError),

    /// The server closed the connection, with its close frame if one was sent.
    WsClosed(Option<CloseFrame<'static>>),
}

impl From<JsonError> for Error {
    fn from(e: JsonError) -> Error {
        Error::Json(e)
    }
}

impl From<TungsteniteError> for Error {
    fn from(e: TungsteniteError) -> Error {
        Error::Ws(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Json(e) => write!(f, "malformed control payload: {e}"),
            Error::UnexpectedBinaryMessage(b) =>
                write!(f, "unexpected binary message ({} bytes)", b.len()),
            Error::Ws(e) => write!(f, "websocket error: {e}"),
            Error::WsClosed(Some(frame)) =>
                write!(f, "websocket closed ({}: {})", u16::from(frame.code), frame.reason),
            Error::WsClosed(None) => write!(f, "websocket closed"),
        }
    }
}

impl std::error::Error for Error {}

#[inline]
pub(crate) fn convert_ws_message(message: Message) -> Result<Option<Payload>> {
    Ok(match message {
        Message::Text(payload) => Some(serde_json::from_str(&payload).map_err(|e| {
            debug!("Unexpected JSON: {e}. Payload: {payload}");
            e
        })?),
        Message::Binary(bytes) => {
            return Err(Error::UnexpectedBinaryMessage(bytes));
        },
        Message::Close(frame) => {
            return Err(Error::WsClosed(frame));
        },
        // Ping/Pong message behaviour is internally handled by tungstenite.
        _ => None,
    })
}
