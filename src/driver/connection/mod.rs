pub mod error;

use super::{
    crypto::{CipherSession, SecretKey},
    discovery,
    tasks::{
        error::{Error as TaskError, Recipient},
        heartbeat::{self, UdpPulse, WsPulse},
        message::*,
        sender::{self, AudioSender},
        udp_rx::{self, UdpRx},
        udp_tx,
        ws::{self as ws_task, SignalReader, SignalWriter},
    },
    Config,
    CryptoMode,
};
use crate::{
    constants::*,
    model::{
        payload::{Hello, Identify, ProtocolData, Ready, SelectProtocol, SessionDescription},
        Opcode,
        Payload,
    },
    ws::WsStream,
    ConnectionInfo,
};
use error::{Error, Result};
use flume::{Receiver, Sender};
use serde::de::DeserializeOwned;
use std::{collections::VecDeque, future::Future, sync::Arc, time::Duration};
use tokio::{net::UdpSocket, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, Instrument};
use url::Url;
use zeroize::Zeroize;

/// The background tasks of one connection, and the signal which stops them.
#[derive(Debug, Default)]
pub(crate) struct TaskSet {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskSet {
    fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(task.in_current_span()));
    }

    /// Stops every task, returning once all have exited.
    pub(crate) async fn shutdown(mut self) {
        self.token.cancel();

        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Connection task failed to exit cleanly: {e}.");
            }
        }
    }
}

impl Drop for TaskSet {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Control messages received during the handshake, awaiting their consumer.
///
/// Replies to a handshake step are taken in order; anything else is held back
/// in arrival order for whoever owns the connection afterwards.
#[derive(Debug)]
pub(crate) struct Inbox {
    rx: Receiver<ConnEvent>,
    backlog: VecDeque<Payload>,
}

impl Inbox {
    pub(crate) fn new(rx: Receiver<ConnEvent>) -> Self {
        Self {
            rx,
            backlog: VecDeque::new(),
        }
    }

    /// Waits for the reply to the current handshake step.
    async fn expect<T: DeserializeOwned>(&mut self, expected: Opcode, wait: Duration) -> Result<T> {
        loop {
            let evt = timeout(wait, self.rx.recv_async())
                .await?
                .map_err(|_| Error::InterconnectFailure(Recipient::Supervisor))?;

            match evt {
                ConnEvent::Payload(p) if p.op == expected => {
                    debug!("Received {expected}.");
                    return Ok(p.data()?);
                },
                ConnEvent::Payload(p) if p.op.is_handshake_reply() =>
                    return Err(Error::UnexpectedOpcode {
                        expected,
                        seen: p.op,
                    }),
                ConnEvent::Payload(p) => {
                    debug!("Holding {} until handshake completes.", p.op);
                    self.backlog.push_back(p);
                },
                ConnEvent::Error(e) => return Err(e.into()),
            }
        }
    }

    /// Yields held-back messages first, then live ones.
    pub(crate) async fn next(&mut self) -> ConnEvent {
        if let Some(p) = self.backlog.pop_front() {
            return ConnEvent::Payload(p);
        }

        self.rx
            .recv_async()
            .await
            .unwrap_or_else(|_| {
                ConnEvent::Error(TaskError::InterconnectFailure(Recipient::Supervisor))
            })
    }
}

/// A live voice session.
pub(crate) struct Connection {
    pub(crate) info: ConnectionInfo,
    pub(crate) ssrc: u32,
    pub(crate) ws: Sender<WsMessage>,
    pub(crate) inbox: Inbox,
    // Kept so the sender's control queue stays open.
    _sender: Sender<SenderMessage>,
    tasks: TaskSet,
}

struct Established {
    ssrc: u32,
    ws: Sender<WsMessage>,
    sender: Sender<SenderMessage>,
    inbox: Inbox,
}

impl Connection {
    /// Runs the full handshake, bounded by the driver timeout.
    ///
    /// On failure, every task and socket opened along the way is closed before
    /// the error is returned.
    #[instrument(skip(config, interconnect))]
    pub(crate) async fn new(
        info: ConnectionInfo,
        config: &Config,
        interconnect: &Interconnect,
    ) -> Result<Connection> {
        let mut tasks = TaskSet::default();
        let attempt = handshake(&info, config, interconnect, &mut tasks);

        let out = match config.driver_timeout {
            Some(t) => timeout(t, attempt).await.unwrap_or(Err(Error::TimedOut)),
            None => attempt.await,
        };

        match out {
            Ok(est) => {
                info!("Connected to: {}", info.endpoint);

                Ok(Connection {
                    info,
                    ssrc: est.ssrc,
                    ws: est.ws,
                    inbox: est.inbox,
                    _sender: est.sender,
                    tasks,
                })
            },
            Err(e) => {
                debug!("Handshake failed ({e}); stopping its tasks.");
                tasks.shutdown().await;
                Err(e)
            },
        }
    }

    /// Stops the session's tasks and waits for them, releasing both sockets.
    pub(crate) async fn shutdown(self) {
        self.tasks.shutdown().await;
        info!("Disconnected from: {}", self.info.endpoint);
    }
}

async fn handshake(
    info: &ConnectionInfo,
    config: &Config,
    interconnect: &Interconnect,
    tasks: &mut TaskSet,
) -> Result<Established> {
    if info.channel_id.is_none() {
        return Err(Error::NoChannel);
    }
    let url = generate_url(&info.endpoint)?;

    let (sink, stream) = WsStream::connect(url).await?.split();
    let (conn_tx, conn_rx) = flume::unbounded();
    let (ws_tx, ws_rx) = flume::unbounded();

    tasks.spawn(ws_task::writer(
        SignalWriter::new(ws_rx, sink),
        tasks.token(),
        conn_tx.clone(),
    ));
    tasks.spawn(ws_task::reader(
        SignalReader {
            stream,
            conn_tx: conn_tx.clone(),
            events: interconnect.events.clone(),
            heartbeat: interconnect.ws_heartbeat.clone(),
            ssrc_users: interconnect.ssrc_users.clone(),
        },
        tasks.token(),
    ));

    let mut inbox = Inbox::new(conn_rx);

    let hello: Hello = inbox.expect(Opcode::Hello, config.payload_timeout).await?;
    let interval = heartbeat_interval(hello.heartbeat_interval)?;
    info!("WS heartbeat duration {}ms.", hello.heartbeat_interval);

    ws_tx.send(WsMessage::Send(Payload::from_data(&Identify {
        server_id: info.guild_id,
        session_id: info.session_id.clone(),
        token: info.token.clone(),
        user_id: info.user_id,
    })?))?;

    // The server closes the session on a heartbeat which precedes Identify.
    tasks.spawn(heartbeat::runner(
        WsPulse(ws_tx.clone()),
        interval,
        interconnect.ws_heartbeat.clone(),
        tasks.token(),
        conn_tx.clone(),
    ));

    let ready: Ready = inbox.expect(Opcode::Ready, config.payload_timeout).await?;
    if !has_valid_mode(&ready.modes, config.crypto_mode) {
        return Err(Error::CryptoModeUnavailable);
    }
    ws_tx.send(WsMessage::SetSsrc(ready.ssrc))?;

    let udp = UdpSocket::bind("0.0.0.0:0").await?;
    udp.connect((ready.ip, ready.port)).await?;

    let (address, port) = discovery::discover(&udp, ready.ssrc, config.discovery_timeout).await?;
    debug!("IP discovery: we are {address}:{port}.");

    let udp = Arc::new(udp);
    let (udp_tx, udp_msg_rx) = flume::unbounded();
    tasks.spawn(udp_tx::runner(
        udp_msg_rx,
        udp.clone(),
        tasks.token(),
        conn_tx.clone(),
    ));
    tasks.spawn(heartbeat::runner(
        UdpPulse(udp_tx.clone()),
        config.udp_keepalive_gap,
        interconnect.udp_heartbeat.clone(),
        tasks.token(),
        conn_tx.clone(),
    ));

    ws_tx.send(WsMessage::Send(Payload::from_data(&SelectProtocol {
        protocol: "udp".into(),
        data: ProtocolData {
            address,
            mode: config.crypto_mode.to_request_str().into(),
            port,
        },
    })?))?;

    let cipher = init_cipher(&mut inbox, config).await?;

    let (sender_ready, sender_ready_rx) = flume::bounded(1);
    let (udp_rx_ready, udp_rx_ready_rx) = flume::bounded(1);
    let (sender_tx, sender_rx) = flume::unbounded();

    tasks.spawn(sender::runner(
        AudioSender::new(
            interconnect.audio_out.clone(),
            sender_rx,
            udp_tx,
            cipher.clone(),
            ready.ssrc,
        ),
        sender_ready,
        tasks.token(),
        conn_tx.clone(),
    ));
    tasks.spawn(udp_rx::runner(
        UdpRx {
            cipher,
            udp_rx: udp,
            ssrc: ready.ssrc,
            ssrc_users: interconnect.ssrc_users.clone(),
            heartbeat: interconnect.udp_heartbeat.clone(),
            inbound: interconnect.audio_in.clone(),
            filter_unknown_ssrcs: config.filter_unknown_ssrcs,
        },
        udp_rx_ready,
        tasks.token(),
        conn_tx,
    ));

    sender_ready_rx
        .recv_async()
        .await
        .map_err(|_| Error::InterconnectFailure(Recipient::Sender))?;
    udp_rx_ready_rx
        .recv_async()
        .await
        .map_err(|_| Error::InterconnectFailure(Recipient::UdpRx))?;

    // Discord only starts forwarding others' audio once we have sent some.
    ws_tx.send(WsMessage::Speaking(true))?;
    let (done_tx, done_rx) = flume::bounded(1);
    sender_tx.send(SenderMessage::Silence(done_tx))?;
    timeout(config.payload_timeout, done_rx.recv_async())
        .await?
        .map_err(|_| Error::InterconnectFailure(Recipient::Sender))?;
    ws_tx.send(WsMessage::Speaking(false))?;

    Ok(Established {
        ssrc: ready.ssrc,
        ws: ws_tx,
        sender: sender_tx,
        inbox,
    })
}

fn generate_url(endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim_end_matches('/');
    let endpoint = endpoint.strip_suffix(":80").unwrap_or(endpoint);

    let url = if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        format!("{endpoint}/?v={VOICE_GATEWAY_VERSION}")
    } else {
        format!("wss://{endpoint}/?v={VOICE_GATEWAY_VERSION}")
    };

    Url::parse(&url).or(Err(Error::EndpointUrl))
}

fn heartbeat_interval(ms: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(ms / 1000.0)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or(Error::IllegalHeartbeatInterval)
}

#[inline]
async fn init_cipher(inbox: &mut Inbox, config: &Config) -> Result<Arc<CipherSession>> {
    let mut desc: SessionDescription = inbox
        .expect(Opcode::SessionDescription, config.payload_timeout)
        .await?;

    let key = SecretKey::from_slice(&desc.secret_key);
    desc.secret_key.zeroize();

    if desc.mode != config.crypto_mode.to_request_str() {
        return Err(Error::CryptoModeInvalid);
    }

    Ok(Arc::new(CipherSession::new(&key?, config.crypto_mode)?))
}

#[inline]
fn has_valid_mode<T, It>(modes: It, mode: CryptoMode) -> bool
where
    T: for<'a> PartialEq<&'a str>,
    It: IntoIterator<Item = T>,
{
    modes.into_iter().any(|s| s == mode.to_request_str())
}
