use super::{error::Result, message::*};
use crate::{
    driver::heartbeat::HeartbeatStats,
    events::CoreContext,
    id::UserId,
    model::{
        payload::{ClientDisconnect, HeartbeatAck, Speaking},
        Opcode,
        Payload,
        SpeakingState,
    },
    ws::{WsReader, WsSink},
};
use dashmap::DashMap;
use flume::{Receiver, Sender};
use std::{sync::Arc, time::Duration};
use tokio::{select, time::timeout};
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Owns the write half of the signaling websocket.
///
/// All outbound control messages (handshake steps, heartbeats, speaking
/// updates) pass through here in queue order.
pub(crate) struct SignalWriter {
    rx: Receiver<WsMessage>,
    sink: WsSink,
    ssrc: u32,
    speaking: SpeakingState,
}

impl SignalWriter {
    pub(crate) fn new(rx: Receiver<WsMessage>, sink: WsSink) -> Self {
        Self {
            rx,
            sink,
            ssrc: 0,
            speaking: SpeakingState::empty(),
        }
    }

    async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        loop {
            let msg = select! {
                biased;
                () = token.cancelled() => break,
                msg = self.rx.recv_async() => match msg {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
            };

            select! {
                biased;
                () = token.cancelled() => break,
                res = self.process(msg) => res?,
            }
        }

        Ok(())
    }

    /// Drops queued messages until the connection is stopped.
    async fn discard_until(&mut self, token: &CancellationToken) {
        loop {
            select! {
                biased;
                () = token.cancelled() => break,
                msg = self.rx.recv_async() => if msg.is_err() {
                    break;
                },
            }
        }
    }

    async fn process(&mut self, msg: WsMessage) -> Result<()> {
        match msg {
            WsMessage::Send(payload) => {
                trace!("Sending {}.", payload.op);
                self.sink.send_json(&payload).await?;
            },
            WsMessage::SetSsrc(ssrc) => self.ssrc = ssrc,
            WsMessage::Speaking(is_speaking) => self.set_speaking(is_speaking).await?,
        }

        Ok(())
    }

    async fn set_speaking(&mut self, is_speaking: bool) -> Result<()> {
        if self.speaking.contains(SpeakingState::MICROPHONE) == is_speaking {
            return Ok(());
        }

        let previous = self.speaking;
        self.speaking.set(SpeakingState::MICROPHONE, is_speaking);
        info!("Changing to {:?}", self.speaking);

        let payload = Payload::from_data(&Speaking {
            delay: Some(0),
            speaking: self.speaking,
            ssrc: self.ssrc,
            user_id: None,
        })?;

        if let Err(e) = self.sink.send_json(&payload).await {
            self.speaking = previous;
            return Err(e.into());
        }

        Ok(())
    }
}

#[instrument(skip(writer, token, conn_tx))]
pub(crate) async fn writer(
    mut writer: SignalWriter,
    token: CancellationToken,
    conn_tx: Sender<ConnEvent>,
) {
    trace!("WS writer started.");

    match writer.run(&token).await {
        Ok(()) => {},
        Err(e) if e.is_transport() => {
            // The reader sees the same closure, along with any close code.
            debug!("Websocket send failed: {e}.");
            writer.discard_until(&token).await;
        },
        Err(e) => {
            error!("Fatal websocket send error: {e}.");
            drop(conn_tx.send(ConnEvent::Error(e)));
        },
    }

    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    if let Ok(Err(e)) = timeout(CLOSE_TIMEOUT, writer.sink.close(Some(frame))).await {
        debug!("Websocket did not close cleanly: {e}.");
    }

    trace!("WS writer finished.");
}

/// Owns the read half of the signaling websocket.
///
/// Heartbeat ACKs and call membership updates are handled here; anything else is
/// forwarded to whoever owns the connection.
pub(crate) struct SignalReader {
    pub(crate) stream: WsReader,
    pub(crate) conn_tx: Sender<ConnEvent>,
    pub(crate) events: Sender<EventMessage>,
    pub(crate) heartbeat: Arc<HeartbeatStats>,
    pub(crate) ssrc_users: Arc<DashMap<u32, UserId>>,
}

impl SignalReader {
    async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        loop {
            let msg = select! {
                biased;
                () = token.cancelled() => break,
                msg = self.stream.recv_json() => msg?,
            };

            if let Some(payload) = msg {
                self.process(payload)?;
            }
        }

        Ok(())
    }

    fn process(&self, payload: Payload) -> Result<()> {
        match payload.op {
            Opcode::HeartbeatAck => {
                let ack: HeartbeatAck = payload.data()?;
                if self.heartbeat.record_ack(ack.nonce) {
                    trace!("Heartbeat ACK received.");
                } else {
                    warn!("Heartbeat nonce mismatch! Saw {}.", ack.nonce);
                }
            },
            Opcode::Speaking => {
                let ev: Speaking = payload.data()?;
                if let Some(user_id) = ev.user_id {
                    self.ssrc_users.insert(ev.ssrc, user_id);
                }

                drop(self.events.send(EventMessage::FireCoreEvent(
                    CoreContext::SpeakingStateUpdate(ev),
                )));
            },
            Opcode::ClientConnect => {
                debug!("Received discontinued ClientConnect: {:?}", payload.d);
            },
            Opcode::ClientDisconnect => {
                let ev: ClientDisconnect = payload.data()?;
                self.ssrc_users.retain(|_, user| *user != ev.user_id);

                drop(self.events.send(EventMessage::FireCoreEvent(
                    CoreContext::ClientDisconnect(ev),
                )));
            },
            _ => self.conn_tx.send(ConnEvent::Payload(payload))?,
        }

        Ok(())
    }
}

#[instrument(skip(reader, token))]
pub(crate) async fn reader(mut reader: SignalReader, token: CancellationToken) {
    trace!("WS reader started.");

    if let Err(e) = reader.run(&token).await {
        if token.is_cancelled() {
            debug!("Websocket read failed during shutdown: {e}.");
        } else {
            error!("Fatal websocket read error: {e}.");
            drop(reader.conn_tx.send(ConnEvent::Error(e)));
        }
    }

    trace!("WS reader finished.");
}
