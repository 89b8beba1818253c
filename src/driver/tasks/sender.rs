use super::{error::Result, message::*};
use crate::{
    constants::*,
    driver::crypto::{CipherSession, CryptoState, RtpHeader},
};
use bytes::Bytes;
use flume::{Receiver, Sender};
use std::{num::Wrapping, sync::Arc};
use tokio::{
    select,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace, warn};

/// Paces outbound audio frames at one per [`TIMESTEP_LENGTH`], turning each
/// into an encrypted RTP packet.
pub(crate) struct AudioSender {
    frames: Receiver<Bytes>,
    control: Receiver<SenderMessage>,
    udp_tx: Sender<UdpTxMessage>,
    cipher: Arc<CipherSession>,
    crypto_state: CryptoState,
    ssrc: u32,
    sequence: Wrapping<u16>,
    timestamp: Wrapping<u32>,
    next_send: Option<Instant>,
    packet: Box<[u8; VOICE_PACKET_MAX]>,
}

impl AudioSender {
    pub(crate) fn new(
        frames: Receiver<Bytes>,
        control: Receiver<SenderMessage>,
        udp_tx: Sender<UdpTxMessage>,
        cipher: Arc<CipherSession>,
        ssrc: u32,
    ) -> Self {
        Self {
            frames,
            control,
            udp_tx,
            crypto_state: cipher.mode().into(),
            cipher,
            ssrc,
            sequence: Wrapping(0),
            timestamp: Wrapping(0),
            next_send: None,
            packet: Box::new([0u8; VOICE_PACKET_MAX]),
        }
    }

    async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        loop {
            let (frame, done) = select! {
                biased;
                () = token.cancelled() => break,
                msg = self.control.recv_async() => match msg {
                    Ok(SenderMessage::Silence(done)) => (Bytes::from_static(&SILENT_FRAME), Some(done)),
                    Err(_) => break,
                },
                frame = self.frames.recv_async() => match frame {
                    Ok(frame) => (frame, None),
                    Err(_) => break,
                },
            };

            // A gap in the audio resets the pacing clock rather than bursting to catch up.
            let now = Instant::now();
            let deadline = self.next_send.filter(|t| *t > now).unwrap_or(now);

            select! {
                biased;
                () = token.cancelled() => break,
                () = sleep_until(deadline) => {},
            }

            self.send_frame(&frame).await?;
            self.next_send = Some(deadline + TIMESTEP_LENGTH);

            if let Some(done) = done {
                drop(done.send(()));
            }
        }

        Ok(())
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        let header = RtpHeader {
            sequence: self.sequence.0,
            timestamp: self.timestamp.0,
            ssrc: self.ssrc,
        };

        let len = match self.cipher.encrypt(
            &mut self.crypto_state,
            header,
            frame,
            &mut self.packet[..],
        ) {
            Ok(len) => len,
            Err(e) => {
                warn!("Dropping outbound frame of {} bytes: {e}.", frame.len());
                return Ok(());
            },
        };

        self.udp_tx
            .send_async(UdpTxMessage::Packet(Bytes::copy_from_slice(
                &self.packet[..len],
            )))
            .await?;

        trace!("Sent packet {}.", self.sequence);
        self.sequence += 1;
        self.timestamp += MONO_FRAME_SIZE as u32;

        Ok(())
    }
}

#[instrument(skip(sender, ready, token, conn_tx))]
pub(crate) async fn runner(
    mut sender: AudioSender,
    ready: Sender<()>,
    token: CancellationToken,
    conn_tx: Sender<ConnEvent>,
) {
    trace!("Audio sender started.");
    drop(ready.send(()));

    if let Err(e) = sender.run(&token).await {
        error!("Fatal audio send error: {e}.");
        drop(conn_tx.send(ConnEvent::Error(e)));
    }

    trace!("Audio sender finished.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::crypto::{CryptoMode, SecretKey};
    use discortp::rtp::{MutableRtpPacket, RtpPacket};
    use std::time::Duration;

    fn cipher() -> Arc<CipherSession> {
        let key = SecretKey::from_slice(&[3u8; KEY_SIZE]).unwrap();
        Arc::new(CipherSession::new(&key, CryptoMode::Normal).unwrap())
    }

    struct Harness {
        frames: Sender<Bytes>,
        control: Sender<SenderMessage>,
        packets: Receiver<UdpTxMessage>,
        token: CancellationToken,
    }

    fn spawn_sender() -> Harness {
        let (frames, frames_rx) = flume::unbounded();
        let (control, control_rx) = flume::unbounded();
        let (udp_tx, packets) = flume::unbounded();
        let (ready, _ready_rx) = flume::bounded(1);
        let (conn_tx, _conn_rx) = flume::unbounded();
        let token = CancellationToken::new();

        let sender = AudioSender::new(frames_rx, control_rx, udp_tx, cipher(), 42);
        tokio::spawn(runner(sender, ready, token.clone(), conn_tx));

        Harness {
            frames,
            control,
            packets,
            token,
        }
    }

    async fn next_packet(h: &Harness) -> Vec<u8> {
        let UdpTxMessage::Packet(p) = h.packets.recv_async().await.unwrap();
        p.to_vec()
    }

    #[tokio::test]
    async fn frames_are_paced_and_numbered() {
        let h = spawn_sender();
        for _ in 0..3 {
            h.frames.send(Bytes::from_static(&[1, 2, 3, 4])).unwrap();
        }

        let start = Instant::now();
        let mut headers = vec![];
        for _ in 0..3 {
            let pkt = next_packet(&h).await;
            let rtp = RtpPacket::new(&pkt).unwrap();
            headers.push((rtp.get_sequence().0 .0, rtp.get_timestamp().0 .0, rtp.get_ssrc()));
        }

        assert!(start.elapsed() >= TIMESTEP_LENGTH * 2 - Duration::from_millis(2));
        assert_eq!(headers, vec![(0, 0, 42), (1, 960, 42), (2, 1920, 42)]);
        h.token.cancel();
    }

    #[tokio::test]
    async fn silence_is_acknowledged_once_sent() {
        let h = spawn_sender();
        let (done, done_rx) = flume::bounded(1);
        h.control.send(SenderMessage::Silence(done)).unwrap();

        done_rx.recv_async().await.unwrap();
        let mut pkt = next_packet(&h).await;
        let mut rtp = MutableRtpPacket::new(&mut pkt[..]).unwrap();
        let range = cipher().decrypt(&mut rtp).unwrap();
        assert_eq!(&discortp::Packet::payload(&rtp)[range], &SILENT_FRAME[..]);
        h.token.cancel();
    }

    #[tokio::test]
    async fn oversized_frames_are_skipped() {
        let h = spawn_sender();
        h.frames
            .send(Bytes::from(vec![0u8; VOICE_PACKET_MAX]))
            .unwrap();
        h.frames.send(Bytes::from_static(&[9])).unwrap();

        let pkt = next_packet(&h).await;
        let rtp = RtpPacket::new(&pkt).unwrap();
        assert_eq!(rtp.get_sequence().0 .0, 0);
        assert!(h.packets.is_empty());
        h.token.cancel();
    }
}
