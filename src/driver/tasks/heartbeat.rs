//! Periodic liveness checks, shared between the signaling and media channels.

use super::{
    error::{Error, Recipient, Result},
    message::*,
};
use crate::{
    constants::UDP_KEEPALIVE_SIZE,
    driver::heartbeat::HeartbeatStats,
    model::{payload::Heartbeat, Payload},
};
use async_trait::async_trait;
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use flume::Sender;
use std::{sync::Arc, time::Duration};
use tokio::{
    select,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace};

/// One kind of heartbeat message.
#[async_trait]
pub(crate) trait Pulse: Send {
    /// Queues the heartbeat numbered `nonce` for sending.
    async fn beat(&mut self, nonce: u64) -> Result<()>;
}

/// Heartbeats on the signaling websocket: opcode 3, carrying the nonce.
#[derive(Debug)]
pub(crate) struct WsPulse(pub Sender<WsMessage>);

#[async_trait]
impl Pulse for WsPulse {
    async fn beat(&mut self, nonce: u64) -> Result<()> {
        let payload = Payload::from_data(&Heartbeat { nonce })?;
        self.0
            .send_async(WsMessage::Send(payload))
            .await
            .map_err(|_| Error::InterconnectFailure(Recipient::AuxNetwork))
    }
}

/// UDP keepalives: a little-endian counter, echoed back by the server.
#[derive(Debug)]
pub(crate) struct UdpPulse(pub Sender<UdpTxMessage>);

#[async_trait]
impl Pulse for UdpPulse {
    async fn beat(&mut self, nonce: u64) -> Result<()> {
        let mut bytes = [0u8; UDP_KEEPALIVE_SIZE];
        LittleEndian::write_u64(&mut bytes, nonce);

        self.0
            .send_async(UdpTxMessage::Packet(Bytes::copy_from_slice(&bytes)))
            .await
            .map_err(|_| Error::InterconnectFailure(Recipient::UdpTx))
    }
}

#[instrument(skip(pulse, stats, token, conn_tx))]
pub(crate) async fn runner<P: Pulse>(
    mut pulse: P,
    interval: Duration,
    stats: Arc<HeartbeatStats>,
    token: CancellationToken,
    conn_tx: Sender<ConnEvent>,
) {
    trace!("Heartbeat monitor started.");
    stats.start();

    let mut nonce = 0u64;
    let mut next_beat = Instant::now() + interval;

    loop {
        select! {
            biased;
            () = token.cancelled() => break,
            () = sleep_until(next_beat) => {},
        }

        stats.record_send(nonce);
        trace!("Sending heartbeat {nonce}.");

        if let Err(e) = pulse.beat(nonce).await {
            error!("Fatal heartbeat send error: {e}.");
            drop(conn_tx.send(ConnEvent::Error(e)));
            break;
        }

        nonce = nonce.wrapping_add(1);
        next_beat += interval;
    }

    trace!("Heartbeat monitor finished.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn beats_count_up_until_cancelled() {
        let (tx, rx) = flume::unbounded();
        let (conn_tx, _conn_rx) = flume::unbounded();
        let stats = Arc::new(HeartbeatStats::default());
        let token = CancellationToken::new();

        let handle = tokio::spawn(runner(
            UdpPulse(tx),
            Duration::from_millis(5),
            stats.clone(),
            token.clone(),
            conn_tx,
        ));

        for expected in 0..3u64 {
            let UdpTxMessage::Packet(p) = rx.recv_async().await.unwrap();
            assert_eq!(LittleEndian::read_u64(&p), expected);
        }

        token.cancel();
        handle.await.unwrap();
        assert!(stats.snapshot().last_nonce >= Some(2));
        assert!(stats.snapshot().started_at.is_some());
    }

    #[tokio::test]
    async fn nothing_is_sent_before_the_first_interval() {
        let (tx, rx) = flume::unbounded();
        let (conn_tx, _conn_rx) = flume::unbounded();
        let token = CancellationToken::new();

        let handle = tokio::spawn(runner(
            WsPulse(tx),
            Duration::from_secs(30),
            Arc::default(),
            token.clone(),
            conn_tx,
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.is_empty());

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (tx, rx) = flume::unbounded::<WsMessage>();
        drop(rx);
        let (conn_tx, conn_rx) = flume::unbounded();

        runner(
            WsPulse(tx),
            Duration::from_millis(1),
            Arc::default(),
            CancellationToken::new(),
            conn_tx,
        )
        .await;

        assert!(matches!(
            conn_rx.recv_async().await,
            Ok(ConnEvent::Error(Error::InterconnectFailure(
                Recipient::AuxNetwork
            )))
        ));
    }
}
