//! Runner for a voice connection.
//!
//! A [`Driver`] owns one voice session at a time. Its work is split across
//! several asynchronous tasks:
//!  * a supervisor, which owns the connection state and drives (re)connection,
//!  * a reader and writer for the signaling websocket,
//!  * heartbeat monitors for both the websocket and UDP channels,
//!  * a paced audio sender and a UDP receiver for voice packets,
//!  * an event processor, which runs user handlers away from packet timing.
//!
//! The handle itself only passes messages to these tasks, and reads the
//! [`Status`] which the supervisor publishes.

pub(crate) mod connection;
mod crypto;
mod discovery;
pub(crate) mod heartbeat;
mod packet;
pub mod retry;
mod state;
pub(crate) mod tasks;
#[cfg(test)]
mod test_server;

use connection::error::{Error, Result};
pub use crypto::{
    CipherSession,
    CryptoMode,
    CryptoState,
    Error as CryptoError,
    RtpHeader,
    SecretKey,
};
pub use heartbeat::{HeartbeatInfo, Heartbeats};
pub use packet::VoicePacket;
pub use state::{ConnectionState, Status};

use crate::{
    events::EventData,
    id::ChannelId,
    Config,
    ConnectionInfo,
    Event,
    EventHandler,
};
use bytes::Bytes;
use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use flume::{r#async::RecvFut, Receiver, SendError, Sender};
use heartbeat::HeartbeatStats;
use std::sync::Arc;
use tasks::message::{CoreMessage, Interconnect};
use tokio::{select, sync::watch};
use tracing::instrument;

/// The control object for a Discord voice connection, handling connection,
/// heartbeating, en/decryption, packet pacing, and event generation.
///
/// Dropping the driver closes it.
#[derive(Debug)]
pub struct Driver {
    config: Config,
    sender: Sender<CoreMessage>,
    status: watch::Receiver<Status>,
    audio_out: Sender<Bytes>,
    audio_in: Receiver<VoicePacket>,
    ws_heartbeat: Arc<HeartbeatStats>,
    udp_heartbeat: Arc<HeartbeatStats>,
}

impl Driver {
    /// Creates a new voice driver.
    ///
    /// This will create the core voice tasks in the background, and so must be
    /// called from within a Tokio runtime.
    #[inline]
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (tx, rx) = flume::unbounded();
        let (evt_tx, evt_rx) = flume::unbounded();
        let (audio_out, audio_out_rx) = flume::bounded(config.outbound_buffer);
        let (audio_in_tx, audio_in) = flume::bounded(config.inbound_buffer);
        let (status_tx, status) = watch::channel(Status::default());

        let interconnect = Interconnect {
            events: evt_tx,
            audio_out: audio_out_rx,
            audio_in: audio_in_tx,
            ssrc_users: Arc::default(),
            ws_heartbeat: Arc::default(),
            udp_heartbeat: Arc::default(),
        };

        let ws_heartbeat = interconnect.ws_heartbeat.clone();
        let udp_heartbeat = interconnect.udp_heartbeat.clone();

        tasks::start(config.clone(), rx, interconnect, evt_rx, status_tx);

        Driver {
            config,
            sender: tx,
            status,
            audio_out,
            audio_in,
            ws_heartbeat,
            udp_heartbeat,
        }
    }

    /// Connects to a voice channel using the specified server.
    ///
    /// This method instantly contacts the driver tasks, and its
    /// does not need to be `await`ed to start the actual connection.
    /// Any existing session is ended first.
    ///
    /// A failed connection attempt is reported to the caller, and is never
    /// retried automatically.
    #[instrument(skip(self))]
    pub fn connect(&mut self, info: ConnectionInfo) -> Connect {
        let (tx, rx) = flume::bounded(1);

        if let Err(SendError(CoreMessage::ConnectWithResult(_, tx))) =
            self.sender.send(CoreMessage::ConnectWithResult(info, tx))
        {
            drop(tx.send(Err(Error::Closed)));
        }

        Connect {
            inner: rx.into_recv_async(),
        }
    }

    /// Leaves the current voice channel, disconnecting from it.
    ///
    /// The driver may be connected again afterwards.
    #[instrument(skip(self))]
    pub fn leave(&mut self) {
        self.send(CoreMessage::Leave);
    }

    /// Shuts the driver down, ending any live session and all background tasks.
    ///
    /// Once this returns, every socket opened by the driver has been released.
    /// Repeated or concurrent calls are harmless, and all wait for the same
    /// shutdown.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let (tx, rx) = flume::bounded(1);
        let mut status = self.status.clone();
        let closed = status.wait_for(|s| s.state == ConnectionState::Closed);

        if self.sender.send(CoreMessage::Close(tx)).is_ok() {
            // Either signal means every task has stopped: a close request
            // racing another may never be read.
            select! {
                _ = rx.recv_async() => {},
                _ = closed => {},
            }
        } else {
            drop(closed.await);
        }
    }

    /// Returns the current lifecycle state of the driver.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    /// Returns the current state, alongside the SSRC of any live session.
    #[must_use]
    pub fn status(&self) -> Status {
        *self.status.borrow()
    }

    /// Returns a receiver which is notified on each change of [`Status`].
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Returns the SSRC assigned to this driver's live session, if any.
    #[must_use]
    pub fn ssrc(&self) -> Option<u32> {
        self.status.borrow().ssrc
    }

    /// Returns the queue which feeds outbound audio.
    ///
    /// Each message must be one 20ms Opus frame. Frames are sent at most
    /// every 20ms, and the queue holds at most [`Config::outbound_buffer`]
    /// frames, so `send_async` will wait whenever the application runs ahead
    /// of the send clock. Frames queued while no session is live are sent
    /// once one is.
    #[must_use]
    pub fn audio_sender(&self) -> Sender<Bytes> {
        self.audio_out.clone()
    }

    /// Returns the queue of decrypted voice packets received from other users.
    ///
    /// Packets are dropped if more than [`Config::inbound_buffer`] are left
    /// unread.
    #[must_use]
    pub fn audio_receiver(&self) -> Receiver<VoicePacket> {
        self.audio_in.clone()
    }

    /// Tells the voice server whether this client is transmitting audio.
    ///
    /// Has no effect unless a session is live.
    #[instrument(skip(self))]
    pub fn speaking(&mut self, speaking: bool) {
        self.send(CoreMessage::Speaking(speaking));
    }

    /// Applies a voice state update from the main gateway.
    ///
    /// A missing channel means this user has left voice, and ends the session.
    /// A new session ID or channel causes any live session to be rebuilt.
    #[instrument(skip(self))]
    pub fn update_state(&mut self, session_id: String, channel_id: Option<ChannelId>) {
        self.send(CoreMessage::UpdateState(session_id, channel_id));
    }

    /// Applies a voice server update from the main gateway.
    ///
    /// A new endpoint or token causes any live session to be rebuilt.
    #[instrument(skip(self, token))]
    pub fn update_server(&mut self, endpoint: String, token: String) {
        self.send(CoreMessage::UpdateServer(endpoint, token));
    }

    /// Returns the liveness of the current session's signaling and UDP channels.
    ///
    /// The driver does not act on missed acknowledgements itself: see
    /// [`HeartbeatInfo::staleness`].
    #[must_use]
    pub fn heartbeats(&self) -> Heartbeats {
        Heartbeats {
            ws: self.ws_heartbeat.snapshot(),
            udp: self.udp_heartbeat.snapshot(),
        }
    }

    /// Sets the configuration for this driver.
    ///
    /// Changes apply from the next connection attempt. Queue capacities are
    /// fixed when the driver is created.
    #[instrument(skip(self))]
    pub fn set_config(&mut self, config: Config) {
        self.config = config.clone();
        self.send(CoreMessage::SetConfig(config));
    }

    /// Returns a view of this driver's configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Attach a global event handler to this driver.
    ///
    /// Users **must** ensure that no costly work or blocking occurs
    /// within the supplied function or closure. *Taking excess time delays
    /// every later event*.
    #[instrument(skip(self, action))]
    pub fn add_global_event<F: EventHandler + 'static>(&mut self, event: Event, action: F) {
        self.send(CoreMessage::AddEvent(EventData::new(event, action)));
    }

    /// Removes all global event handlers from this driver.
    #[instrument(skip(self))]
    pub fn remove_all_global_events(&mut self) {
        self.send(CoreMessage::RemoveGlobalEvents);
    }

    /// Sends a message to the inner tasks.
    ///
    /// A closed driver silently ignores all further requests.
    fn send(&mut self, msg: CoreMessage) {
        drop(self.sender.send(msg));
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Future for a call to [`Driver::connect`].
///
/// This future awaits the *result* of a connection; the driver
/// is messaged at the time of the call.
///
/// [`Driver::connect`]: Driver::connect
pub struct Connect {
    inner: RecvFut<'static, Result<()>>,
}

impl Future for Connect {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Ready(r) => Poll::Ready(r.map_err(|_| Error::AttemptDiscarded).and_then(|x| x)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        retry::{Retry, Strategy},
        test_server::*,
        *,
    };
    use crate::{
        constants::SILENT_FRAME,
        events::context_data::{DisconnectKind, DisconnectReason},
        id::UserId,
        model::{CloseCode, Opcode},
        CoreEvent,
        EventContext,
    };
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Seen {
        Connect(u32),
        Reconnecting(Option<DisconnectReason>),
        Reconnect(u32),
        Disconnect(DisconnectKind, Option<DisconnectReason>),
    }

    struct Recorder(flume::Sender<Seen>);

    #[async_trait]
    impl EventHandler for Recorder {
        async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
            let seen = match ctx {
                EventContext::DriverConnect(d) => Seen::Connect(d.ssrc),
                EventContext::DriverReconnecting(d) => Seen::Reconnecting(d.reason),
                EventContext::DriverReconnect(d) => Seen::Reconnect(d.ssrc),
                EventContext::DriverDisconnect(d) => Seen::Disconnect(d.kind, d.reason),
                _ => return None,
            };

            drop(self.0.send(seen));
            None
        }
    }

    fn record_lifecycle(driver: &mut Driver) -> flume::Receiver<Seen> {
        let (tx, rx) = flume::unbounded();

        for evt in [
            CoreEvent::DriverConnect,
            CoreEvent::DriverReconnecting,
            CoreEvent::DriverReconnect,
            CoreEvent::DriverDisconnect,
        ] {
            driver.add_global_event(evt.into(), Recorder(tx.clone()));
        }

        rx
    }

    async fn next_seen(rx: &flume::Receiver<Seen>) -> Seen {
        timeout(Duration::from_secs(5), rx.recv_async())
            .await
            .unwrap()
            .unwrap()
    }

    fn fast_config() -> Config {
        Config::default()
            .driver_retry(Retry {
                strategy: Strategy::Every(Duration::from_millis(50)),
                retry_limit: Some(3),
            })
            .payload_timeout(Duration::from_secs(2))
            .discovery_timeout(Duration::from_secs(2))
            .udp_keepalive_gap(Duration::from_millis(50))
    }

    async fn wait_for_state(driver: &Driver, state: ConnectionState) -> Status {
        let mut rx = driver.watch_status();
        let status = *timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == state))
            .await
            .unwrap()
            .unwrap();
        status
    }

    #[tokio::test]
    async fn full_session_carries_audio_both_ways() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.connect(server.info()).await.unwrap();

        assert_eq!(
            driver.status(),
            Status {
                state: ConnectionState::Connected,
                ssrc: Some(FIRST_SSRC),
            }
        );
        assert_eq!(next_seen(&seen).await, Seen::Connect(FIRST_SSRC));

        // The handshake's own silence comes first.
        let (first_seq, frame) = server.next_voice().await;
        assert_eq!(frame, SILENT_FRAME);

        driver
            .audio_sender()
            .send_async(Bytes::from_static(&[1, 2, 3]))
            .await
            .unwrap();
        let (seq, frame) = server.next_voice().await;
        assert_eq!(frame, [1, 2, 3]);
        assert_eq!(seq, first_seq.wrapping_add(1));

        let inbound = driver.audio_receiver();
        let packet = timeout(Duration::from_secs(5), async {
            loop {
                server.send_voice(1, &[9, 9, 9]).await;
                if let Ok(p) = timeout(Duration::from_millis(50), inbound.recv_async()).await {
                    break p.unwrap();
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(packet.ssrc, REMOTE_SSRC);
        assert_eq!(packet.user_id.map(UserId::get), Some(REMOTE_USER));
        assert_eq!(&packet.payload[..], &[9, 9, 9]);

        sleep(Duration::from_millis(200)).await;
        let beats = driver.heartbeats();
        assert!(beats.ws.last_ack.is_some());
        assert!(beats.udp.last_ack.is_some());

        driver.close().await;
        assert_eq!(driver.state(), ConnectionState::Closed);
        assert_eq!(
            next_seen(&seen).await,
            Seen::Disconnect(DisconnectKind::Runtime, None)
        );
        server.wait_ws_closed(1).await;
    }

    #[tokio::test]
    async fn forged_voice_is_dropped_without_ending_the_session() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());
        let inbound = driver.audio_receiver();

        driver.connect(server.info()).await.unwrap();

        let packet = timeout(Duration::from_secs(5), async {
            let mut seq = 0u16;
            loop {
                server.send_forged_voice(seq).await;
                server.send_voice(seq.wrapping_add(1), &[4, 5, 6]).await;
                seq = seq.wrapping_add(2);
                if let Ok(p) = timeout(Duration::from_millis(50), inbound.recv_async()).await {
                    break p.unwrap();
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(&packet.payload[..], &[4, 5, 6]);
        assert_eq!(packet.sequence % 2, 1);
        assert_eq!(driver.state(), ConnectionState::Connected);

        driver.close().await;
    }

    #[tokio::test]
    async fn heartbeats_start_after_identify() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());

        driver.connect(server.info()).await.unwrap();
        sleep(Duration::from_millis(200)).await;

        let ops = server.received(0);
        let identify = ops.iter().position(|op| *op == Opcode::Identify).unwrap();
        let heartbeat = ops.iter().position(|op| *op == Opcode::Heartbeat).unwrap();
        assert!(identify < heartbeat);

        driver.close().await;
    }

    #[tokio::test]
    async fn misordered_ready_aborts_before_udp() {
        let server = TestServer::start(Script {
            ready_before_hello: true,
            ..Default::default()
        })
        .await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        let out = driver.connect(server.info()).await;
        assert!(matches!(
            out,
            Err(Error::UnexpectedOpcode {
                expected: Opcode::Hello,
                seen: Opcode::Ready,
            })
        ));
        assert_eq!(driver.state(), ConnectionState::Disconnected);
        assert_eq!(
            next_seen(&seen).await,
            Seen::Disconnect(
                DisconnectKind::Connect,
                Some(DisconnectReason::ProtocolViolation)
            )
        );

        server.wait_ws_closed(1).await;
        assert_eq!(server.udp_packets(), 0);
        assert!(!server.received(0).contains(&Opcode::Identify));

        // Failed first connections are left to the caller.
        sleep(Duration::from_millis(200)).await;
        assert_eq!(server.sessions(), 1);
    }

    async fn misordered_reply(script: Script, expected: Opcode, seen: Opcode) -> TestServer {
        let server = TestServer::start(script).await;
        let mut driver = Driver::new(fast_config());

        let out = driver.connect(server.info()).await;
        assert!(
            matches!(out, Err(Error::UnexpectedOpcode { expected: e, seen: s }) if e == expected && s == seen),
            "{out:?}"
        );
        assert_eq!(driver.state(), ConnectionState::Disconnected);
        server.wait_ws_closed(1).await;

        server
    }

    #[tokio::test]
    async fn misordered_identify_reply_aborts_before_udp() {
        for seen in [Opcode::Hello, Opcode::SessionDescription] {
            let script = Script {
                identify_reply: seen,
                ..Default::default()
            };
            let server = misordered_reply(script, Opcode::Ready, seen).await;

            assert!(!server.received(0).contains(&Opcode::SelectProtocol));
            assert_eq!(server.udp_packets(), 0);
        }
    }

    #[tokio::test]
    async fn misordered_session_description_releases_udp() {
        let script = Script {
            select_reply: Opcode::Ready,
            ..Default::default()
        };
        let server = misordered_reply(script, Opcode::SessionDescription, Opcode::Ready).await;
        assert!(server.received(0).contains(&Opcode::SelectProtocol));

        // Discovery went out, but every UDP task stopped with the handshake.
        sleep(Duration::from_millis(100)).await;
        let sent = server.udp_packets();
        assert!(sent >= 1);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(server.udp_packets(), sent);
        assert_eq!(server.sessions(), 1);
    }

    #[tokio::test]
    async fn discovery_timeout_closes_signaling() {
        let server = TestServer::start(Script {
            stall_discovery: true,
            ..Default::default()
        })
        .await;
        let mut driver = Driver::new(fast_config().discovery_timeout(Duration::from_millis(200)));

        let out = driver.connect(server.info()).await;
        assert!(matches!(out, Err(Error::TimedOut)));
        assert_eq!(driver.state(), ConnectionState::Disconnected);

        server.wait_ws_closed(1).await;
    }

    #[tokio::test]
    async fn dropped_session_reconnects_with_fresh_ssrc() {
        let server = TestServer::start(Script {
            drop_first_session: Some(1001),
            ..Default::default()
        })
        .await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.connect(server.info()).await.unwrap();
        assert_eq!(next_seen(&seen).await, Seen::Connect(FIRST_SSRC));
        assert_eq!(
            next_seen(&seen).await,
            Seen::Reconnecting(Some(DisconnectReason::WsClosed(None)))
        );
        assert_eq!(next_seen(&seen).await, Seen::Reconnect(FIRST_SSRC + 1));

        assert_eq!(driver.ssrc(), Some(FIRST_SSRC + 1));
        assert_eq!(driver.state(), ConnectionState::Connected);
        assert_eq!(server.sessions(), 2);

        driver.close().await;
    }

    #[tokio::test]
    async fn invalidated_session_is_not_resumed() {
        let server = TestServer::start(Script {
            drop_first_session: Some(4006),
            ..Default::default()
        })
        .await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.connect(server.info()).await.unwrap();
        assert_eq!(next_seen(&seen).await, Seen::Connect(FIRST_SSRC));
        assert_eq!(
            next_seen(&seen).await,
            Seen::Disconnect(
                DisconnectKind::Runtime,
                Some(DisconnectReason::WsClosed(Some(CloseCode::SessionInvalid)))
            )
        );

        let status = wait_for_state(&driver, ConnectionState::Disconnected).await;
        assert_eq!(status.ssrc, None);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(server.sessions(), 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.connect(server.info()).await.unwrap();
        assert_eq!(next_seen(&seen).await, Seen::Connect(FIRST_SSRC));

        timeout(Duration::from_secs(5), async {
            tokio::join!(driver.close(), driver.close());
        })
        .await
        .unwrap();
        driver.close().await;
        assert_eq!(driver.state(), ConnectionState::Closed);

        assert!(matches!(
            driver.connect(server.info()).await,
            Err(Error::Closed | Error::AttemptDiscarded)
        ));

        server.wait_ws_closed(1).await;
        sleep(Duration::from_millis(100)).await;
        let disconnects: Vec<_> = seen.try_iter().collect();
        assert_eq!(disconnects, [Seen::Disconnect(DisconnectKind::Runtime, None)]);
    }

    #[tokio::test]
    async fn requests_queued_behind_close_are_answered() {
        let server = TestServer::start(Script::default()).await;
        let driver = Driver::new(fast_config());

        let (close_tx, close_rx) = flume::bounded(1);
        let (late_close_tx, late_close_rx) = flume::bounded(1);
        let (connect_tx, connect_rx) = flume::bounded(1);
        driver.sender.send(CoreMessage::Close(close_tx)).unwrap();
        driver.sender.send(CoreMessage::Close(late_close_tx)).unwrap();
        driver
            .sender
            .send(CoreMessage::ConnectWithResult(server.info(), connect_tx))
            .unwrap();

        let wait = Duration::from_secs(5);
        timeout(wait, close_rx.recv_async()).await.unwrap().unwrap();
        timeout(wait, late_close_rx.recv_async()).await.unwrap().unwrap();
        assert!(matches!(
            timeout(wait, connect_rx.recv_async()).await.unwrap(),
            Ok(Err(Error::Closed))
        ));
        assert_eq!(server.sessions(), 0);
    }

    #[tokio::test]
    async fn close_without_session_is_quiet() {
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.close().await;

        assert_eq!(driver.state(), ConnectionState::Closed);
        sleep(Duration::from_millis(50)).await;
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn leave_allows_a_later_connect() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.connect(server.info()).await.unwrap();
        assert_eq!(next_seen(&seen).await, Seen::Connect(FIRST_SSRC));

        driver.leave();
        assert_eq!(
            next_seen(&seen).await,
            Seen::Disconnect(DisconnectKind::Runtime, None)
        );
        wait_for_state(&driver, ConnectionState::Disconnected).await;
        server.wait_ws_closed(1).await;

        driver.connect(server.info()).await.unwrap();
        assert_eq!(driver.ssrc(), Some(FIRST_SSRC + 1));

        driver.close().await;
    }

    #[tokio::test]
    async fn new_credentials_renew_the_session() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());
        let seen = record_lifecycle(&mut driver);

        driver.connect(server.info()).await.unwrap();
        assert_eq!(next_seen(&seen).await, Seen::Connect(FIRST_SSRC));

        // Identical details leave the session alone.
        driver.update_server(server.endpoint().into(), "token".into());
        driver.update_server(server.endpoint().into(), "fresh-token".into());
        assert_eq!(next_seen(&seen).await, Seen::Reconnecting(None));
        assert_eq!(next_seen(&seen).await, Seen::Reconnect(FIRST_SSRC + 1));
        assert_eq!(server.sessions(), 2);

        driver.update_state("session".into(), None);
        assert_eq!(
            next_seen(&seen).await,
            Seen::Disconnect(DisconnectKind::Runtime, None)
        );
        wait_for_state(&driver, ConnectionState::Disconnected).await;

        driver.close().await;
    }

    #[tokio::test]
    async fn missing_channel_is_rejected() {
        let server = TestServer::start(Script::default()).await;
        let mut driver = Driver::new(fast_config());

        let mut info = server.info();
        info.channel_id = None;

        assert!(matches!(driver.connect(info).await, Err(Error::NoChannel)));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(server.sessions(), 0);
    }
}
