use super::{error::Result, message::*};
use crate::{
    constants::*,
    driver::{crypto::CipherSession, heartbeat::HeartbeatStats, VoicePacket},
    id::UserId,
};
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use dashmap::DashMap;
use discortp::{
    discord::IpDiscoveryPacket,
    rtp::{MutableRtpPacket, RtpExtensionPacket},
    Packet,
    PacketSize,
};
use flume::{Sender, TrySendError};
use std::sync::Arc;
use tokio::{net::UdpSocket, select};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace, warn};

/// The kinds of datagram the voice server sends us.
#[derive(Debug, Eq, PartialEq)]
enum Datagram {
    Keepalive(u64),
    Discovery,
    Rtcp,
    Rtp,
    Unknown,
}

fn classify(packet: &[u8]) -> Datagram {
    if packet.len() == UDP_KEEPALIVE_SIZE {
        return Datagram::Keepalive(LittleEndian::read_u64(packet));
    }

    if packet.len() == IpDiscoveryPacket::const_packet_size() && packet[..2] == [0, 2] {
        return Datagram::Discovery;
    }

    match packet {
        [first, second, ..] if first >> 6 == RTP_VERSION => {
            if (200..=204).contains(second) {
                Datagram::Rtcp
            } else {
                Datagram::Rtp
            }
        },
        _ => Datagram::Unknown,
    }
}

pub(crate) struct UdpRx {
    pub(crate) cipher: Arc<CipherSession>,
    pub(crate) udp_rx: Arc<UdpSocket>,
    pub(crate) ssrc: u32,
    pub(crate) ssrc_users: Arc<DashMap<u32, UserId>>,
    pub(crate) heartbeat: Arc<HeartbeatStats>,
    pub(crate) inbound: Sender<VoicePacket>,
    pub(crate) filter_unknown_ssrcs: bool,
}

impl UdpRx {
    async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        let mut buf = vec![0u8; VOICE_PACKET_MAX];

        loop {
            let received = select! {
                biased;
                () = token.cancelled() => break,
                r = self.udp_rx.recv(&mut buf) => r,
            };

            match received {
                Ok(len) => self.process_udp_message(&mut buf[..len]),
                Err(e) => super::error::Error::from(e).disarm_would_block()?,
            }
        }

        Ok(())
    }

    // Nothing in here may end the connection: a bad packet only costs itself.
    fn process_udp_message(&self, packet: &mut [u8]) {
        match classify(packet) {
            Datagram::Keepalive(nonce) =>
                if self.heartbeat.record_ack(nonce) {
                    trace!("UDP keepalive ACK received.");
                } else {
                    warn!("UDP keepalive nonce mismatch: saw {nonce}.");
                },
            Datagram::Discovery => trace!("Ignoring late IP discovery response."),
            Datagram::Rtcp => trace!("Ignoring RTCP packet."),
            Datagram::Rtp => self.process_rtp(packet),
            Datagram::Unknown => warn!("Illegal UDP packet from voice server."),
        }
    }

    fn process_rtp(&self, packet: &mut [u8]) {
        let Some(mut rtp) = MutableRtpPacket::new(packet) else {
            warn!("RTP packet too small.");
            return;
        };

        if rtp.get_payload_type() != RTP_PROFILE_TYPE {
            trace!("Ignoring RTP packet of type {:?}.", rtp.get_payload_type());
            return;
        }

        let ssrc = rtp.get_ssrc();
        if ssrc == self.ssrc {
            return;
        }

        let user_id = self.ssrc_users.get(&ssrc).map(|user| *user);
        if user_id.is_none() && self.filter_unknown_ssrcs {
            trace!("Dropping packet from unknown SSRC {ssrc}.");
            return;
        }

        let has_extension = rtp.get_extension() != 0;
        let body = match self.cipher.decrypt(&mut rtp) {
            Ok(body) => body,
            Err(e) => {
                warn!("RTP decryption failed for SSRC {ssrc}: {e}.");
                return;
            },
        };

        let audio = &rtp.payload()[body];
        let start = if has_extension {
            match RtpExtensionPacket::new(audio).map(|ext| ext.packet_size()) {
                Some(size) if size <= audio.len() => size,
                _ => {
                    warn!("Extension packet indicated, but insufficient space.");
                    return;
                },
            }
        } else {
            0
        };

        let pkt = VoicePacket {
            ssrc,
            user_id,
            sequence: rtp.get_sequence().0 .0,
            timestamp: rtp.get_timestamp().0 .0,
            payload: Bytes::copy_from_slice(&audio[start..]),
        };

        if let Err(TrySendError::Full(_)) = self.inbound.try_send(pkt) {
            trace!("Inbound audio queue full; dropping packet.");
        }
    }
}

#[instrument(skip(rx, ready, token, conn_tx))]
pub(crate) async fn runner(
    mut rx: UdpRx,
    ready: Sender<()>,
    token: CancellationToken,
    conn_tx: Sender<ConnEvent>,
) {
    trace!("UDP receive handle started.");
    drop(ready.send(()));

    if let Err(e) = rx.run(&token).await {
        error!("Fatal UDP receive error: {e}.");
        drop(conn_tx.send(ConnEvent::Error(e)));
    }

    trace!("UDP receive handle stopped.");
}
