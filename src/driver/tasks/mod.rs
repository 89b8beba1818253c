#![allow(missing_docs)]

pub mod error;
mod events;
pub(crate) mod heartbeat;
pub mod message;
pub(crate) mod sender;
pub(crate) mod udp_rx;
pub(crate) mod udp_tx;
pub(crate) mod ws;

use super::{
    connection::{error::Error as ConnectionError, Connection},
    ConnectionState,
    Status,
};
use crate::{
    events::{
        context_data::{DisconnectKind, DisconnectReason},
        internal_data::{InternalConnect, InternalDisconnect},
        CoreContext,
    },
    Config,
    ConnectionInfo,
};
use flume::{Receiver, RecvError};
use message::*;
use std::{future::pending, ops::ControlFlow, time::Duration};
use tokio::{
    select,
    spawn,
    sync::watch,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, instrument, trace, warn};

pub(crate) fn start(
    config: Config,
    rx: Receiver<CoreMessage>,
    interconnect: Interconnect,
    evt_rx: Receiver<EventMessage>,
    status: watch::Sender<Status>,
) {
    spawn(async move {
        trace!("Event processor started.");
        events::runner(evt_rx).await;
        trace!("Event processor finished.");
    });

    spawn(async move {
        trace!("Driver started.");
        runner(config, rx, interconnect, status).await;
        trace!("Driver finished.");
    });
}

/// A reconnection attempt waiting out its back-off.
#[derive(Debug)]
struct PendingRetry {
    attempt: usize,
    last_wait: Option<Duration>,
    at: Instant,
}

/// Sole owner of the live connection and of the published [`Status`].
struct Supervisor {
    config: Config,
    interconnect: Interconnect,
    status: watch::Sender<Status>,
    info: Option<ConnectionInfo>,
    connection: Option<Connection>,
    retry: Option<PendingRetry>,
}

enum Action {
    Core(Result<CoreMessage, RecvError>),
    Conn(ConnEvent),
    Retry,
}

#[instrument(skip(rx, interconnect, status))]
async fn runner(
    config: Config,
    rx: Receiver<CoreMessage>,
    interconnect: Interconnect,
    status: watch::Sender<Status>,
) {
    Supervisor {
        config,
        interconnect,
        status,
        info: None,
        connection: None,
        retry: None,
    }
    .run(rx)
    .await;
}

async fn next_event(connection: &mut Option<Connection>) -> ConnEvent {
    match connection {
        Some(conn) => conn.inbox.next().await,
        None => pending().await,
    }
}

impl Supervisor {
    async fn run(mut self, rx: Receiver<CoreMessage>) {
        loop {
            let retry_at = self.retry.as_ref().map(|r| r.at);

            let action = select! {
                msg = rx.recv_async() => Action::Core(msg),
                evt = next_event(&mut self.connection) => Action::Conn(evt),
                () = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => Action::Retry,
            };

            match action {
                Action::Core(Ok(msg)) =>
                    if self.handle_message(msg).await.is_break() {
                        break;
                    },
                Action::Core(Err(_)) => {
                    debug!("Driver handle dropped.");
                    self.close().await;
                    break;
                },
                Action::Conn(evt) => self.handle_conn_event(evt).await,
                Action::Retry => self.attempt_retry().await,
            }
        }

        trace!("Main thread exited");
        self.interconnect.poison();

        // Requests queued behind the shutdown would otherwise wait forever, as the
        // handle keeps this channel open.
        for msg in rx.drain() {
            match msg {
                CoreMessage::ConnectWithResult(_, tx) => drop(tx.send(Err(ConnectionError::Closed))),
                CoreMessage::Close(tx) => drop(tx.send(())),
                _ => {},
            }
        }
    }

    async fn handle_message(&mut self, msg: CoreMessage) -> ControlFlow<()> {
        match msg {
            CoreMessage::ConnectWithResult(info, tx) => {
                if self.end_session().await {
                    self.fire_disconnect(DisconnectKind::Runtime, None);
                }
                self.info = Some(info);

                // Other side may not be listening: this is fine.
                drop(tx.send(self.connect().await));
            },
            CoreMessage::Close(tx) => {
                self.close().await;
                drop(tx.send(()));
                return ControlFlow::Break(());
            },
            CoreMessage::Leave => self.leave().await,
            CoreMessage::UpdateState(session_id, Some(channel_id)) => {
                let changed = self
                    .info
                    .as_mut()
                    .map_or(false, |info| info.apply_state_update(session_id, channel_id));

                if changed {
                    self.renew().await;
                }
            },
            CoreMessage::UpdateState(_, None) => self.leave().await,
            CoreMessage::UpdateServer(endpoint, token) => {
                let changed = self
                    .info
                    .as_mut()
                    .map_or(false, |info| info.apply_server_update(endpoint, token));

                if changed {
                    self.renew().await;
                }
            },
            CoreMessage::Speaking(speaking) =>
                if let Some(conn) = &self.connection {
                    drop(conn.ws.send(WsMessage::Speaking(speaking)));
                } else {
                    debug!("Not connected: speaking state {speaking} not sent.");
                },
            CoreMessage::AddEvent(evt) => {
                drop(self.interconnect.events.send(EventMessage::AddGlobalEvent(evt)));
            },
            CoreMessage::RemoveGlobalEvents => {
                drop(self.interconnect.events.send(EventMessage::RemoveGlobalEvents));
            },
            CoreMessage::SetConfig(config) => {
                self.config = config;
            },
        }

        ControlFlow::Continue(())
    }

    async fn handle_conn_event(&mut self, evt: ConnEvent) {
        match evt {
            ConnEvent::Payload(p) => {
                debug!("Unhandled payload {}: {:?}", p.op, p.d);
            },
            ConnEvent::Error(e) => {
                warn!("Voice connection failed: {e}.");
                let reason = Some(DisconnectReason::from(&e));

                if let Some(conn) = self.connection.take() {
                    conn.shutdown().await;
                }

                if e.should_reconnect() {
                    self.set_state(ConnectionState::Reconnecting, None);
                    self.fire_reconnecting(reason);
                    self.schedule_retry(0, None, reason);
                } else {
                    info!("Session invalidated by server; not reconnecting.");
                    self.set_state(ConnectionState::Disconnected, None);
                    self.fire_disconnect(DisconnectKind::Runtime, reason);
                }
            },
        }
    }

    /// Runs one handshake against the current connection info.
    async fn handshake(&mut self) -> Result<(), ConnectionError> {
        let info = self.info.clone().ok_or(ConnectionError::AttemptDiscarded)?;

        self.set_state(ConnectionState::Connecting, None);
        self.interconnect.reset_session();

        let conn = Connection::new(info, &self.config, &self.interconnect).await?;
        self.set_state(ConnectionState::Connected, Some(conn.ssrc));
        self.connection = Some(conn);

        Ok(())
    }

    async fn connect(&mut self) -> Result<(), ConnectionError> {
        match self.handshake().await {
            Ok(()) => {
                self.fire_connect(false);
                Ok(())
            },
            Err(e) => {
                warn!("Connection attempt failed: {e}.");
                self.set_state(ConnectionState::Disconnected, None);
                self.fire_disconnect(DisconnectKind::Connect, Some((&e).into()));
                Err(e)
            },
        }
    }

    async fn attempt_retry(&mut self) {
        let Some(retry) = self.retry.take() else {
            return;
        };

        info!("Reconnection attempt {}.", retry.attempt + 1);

        match self.handshake().await {
            Ok(()) => self.fire_connect(true),
            Err(e) => {
                warn!("Reconnection attempt failed: {e}.");
                let reason = Some((&e).into());

                if e.should_retry() {
                    self.schedule_retry(retry.attempt + 1, retry.last_wait, reason);
                } else {
                    self.set_state(ConnectionState::Disconnected, None);
                    self.fire_disconnect(DisconnectKind::Reconnect, reason);
                }
            },
        }
    }

    fn schedule_retry(
        &mut self,
        attempt: usize,
        last_wait: Option<Duration>,
        reason: Option<DisconnectReason>,
    ) {
        match self.config.driver_retry.retry_in(last_wait, attempt) {
            Some(wait) => {
                debug!("Reconnecting in {wait:?}.");
                self.set_state(ConnectionState::Reconnecting, None);
                self.retry = Some(PendingRetry {
                    attempt,
                    last_wait: Some(wait),
                    at: Instant::now() + wait,
                });
            },
            None => {
                info!("Reconnection attempts exhausted.");
                self.set_state(ConnectionState::Disconnected, None);
                self.fire_disconnect(DisconnectKind::Reconnect, reason);
            },
        }
    }

    /// Replaces a live (or recovering) session after its credentials changed.
    async fn renew(&mut self) {
        if !self.end_session().await {
            return;
        }

        info!("Session details changed; reconnecting.");
        self.set_state(ConnectionState::Reconnecting, None);
        self.fire_reconnecting(None);
        self.retry = Some(PendingRetry {
            attempt: 0,
            last_wait: None,
            at: Instant::now(),
        });
    }

    async fn leave(&mut self) {
        if self.end_session().await {
            self.fire_disconnect(DisconnectKind::Runtime, None);
        }

        self.info = None;
        self.set_state(ConnectionState::Disconnected, None);
    }

    async fn close(&mut self) {
        if self.end_session().await {
            self.fire_disconnect(DisconnectKind::Runtime, None);
        }

        self.set_state(ConnectionState::Closed, None);
        info!("Driver closed.");
    }

    /// Tears down any live connection and pending retry, returning whether either existed.
    async fn end_session(&mut self) -> bool {
        let pending = self.retry.take().is_some();

        match self.connection.take() {
            Some(conn) => {
                conn.shutdown().await;
                true
            },
            None => pending,
        }
    }

    fn set_state(&self, state: ConnectionState, ssrc: Option<u32>) {
        let old = self.status.send_replace(Status { state, ssrc });
        if old.state != state {
            debug!("Connection state: {} -> {}.", old.state, state);
        }
    }

    fn fire(&self, ctx: CoreContext) {
        drop(
            self.interconnect
                .events
                .send(EventMessage::FireCoreEvent(ctx)),
        );
    }

    fn fire_connect(&self, reconnect: bool) {
        if let Some(conn) = &self.connection {
            let data = InternalConnect::new(&conn.info, conn.ssrc);
            self.fire(if reconnect {
                CoreContext::DriverReconnect(data)
            } else {
                CoreContext::DriverConnect(data)
            });
        }
    }

    fn fire_reconnecting(&self, reason: Option<DisconnectReason>) {
        if let Some(info) = &self.info {
            self.fire(CoreContext::DriverReconnecting(InternalDisconnect::new(
                info,
                DisconnectKind::Runtime,
                reason,
            )));
        }
    }

    fn fire_disconnect(&self, kind: DisconnectKind, reason: Option<DisconnectReason>) {
        if let Some(info) = &self.info {
            self.fire(CoreContext::DriverDisconnect(InternalDisconnect::new(
                info, kind, reason,
            )));
        }
    }
}
