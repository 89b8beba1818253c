use super::{error::Error, message::*};
use flume::{Receiver, Sender};
use std::sync::Arc;
use tokio::{net::UdpSocket, select};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace};

/// Sole writer to the media socket, so that audio and keepalives never interleave
/// mid-send.
struct UdpTx {
    rx: Receiver<UdpTxMessage>,
    udp_tx: Arc<UdpSocket>,
}

impl UdpTx {
    async fn run(&mut self, token: &CancellationToken) -> Result<(), Error> {
        loop {
            let msg = select! {
                biased;
                () = token.cancelled() => break,
                msg = self.rx.recv_async() => msg,
            };

            match msg {
                Ok(UdpTxMessage::Packet(p)) =>
                    if let Err(e) = self.udp_tx.send(&p[..]).await {
                        Error::from(e).disarm_would_block()?;
                    },
                Err(_) => break,
            }
        }

        Ok(())
    }
}

#[instrument(skip(rx, udp_tx, token, conn_tx))]
pub(crate) async fn runner(
    rx: Receiver<UdpTxMessage>,
    udp_tx: Arc<UdpSocket>,
    token: CancellationToken,
    conn_tx: Sender<ConnEvent>,
) {
    trace!("UDP transmit handle started.");

    let mut txer = UdpTx { rx, udp_tx };

    if let Err(e) = txer.run(&token).await {
        error!("Fatal UDP packet send error: {e}.");
        drop(conn_tx.send(ConnEvent::Error(e)));
    }

    trace!("UDP transmit handle stopped.");
}
