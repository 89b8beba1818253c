//! A scripted voice server on localhost, for driving whole sessions in tests.

use super::{discovery::tests::response, CipherSession, CryptoMode, CryptoState, RtpHeader, SecretKey};
use crate::{
    constants::*,
    id::{ChannelId, GuildId, UserId},
    model::{Opcode, Payload},
    ConnectionInfo,
};
use discortp::{
    discord::{IpDiscoveryPacket, IpDiscoveryType},
    rtp::{MutableRtpPacket, RtpPacket},
    Packet,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use std::{
    net::SocketAddr,
    num::NonZeroU64,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    net::{TcpListener, TcpStream, UdpSocket},
    time::{sleep, timeout},
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};

pub(crate) const KEY: [u8; KEY_SIZE] = [7; KEY_SIZE];
/// SSRC handed to the first session; each later session adds one.
pub(crate) const FIRST_SSRC: u32 = 1000;
pub(crate) const REMOTE_SSRC: u32 = 777;
pub(crate) const REMOTE_USER: u64 = 5;

#[derive(Clone, Debug)]
pub(crate) struct Script {
    /// Send Ready in place of Hello when a client connects.
    pub(crate) ready_before_hello: bool,
    /// Never answer IP discovery.
    pub(crate) stall_discovery: bool,
    /// Reply sent in answer to Identify.
    pub(crate) identify_reply: Opcode,
    /// Reply sent in answer to SelectProtocol.
    pub(crate) select_reply: Opcode,
    /// Heartbeat interval advertised in Hello, in milliseconds.
    pub(crate) heartbeat_interval: f64,
    /// Close the first session shortly after it is established, with this code.
    pub(crate) drop_first_session: Option<u16>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            ready_before_hello: false,
            stall_discovery: false,
            identify_reply: Opcode::Ready,
            select_reply: Opcode::SessionDescription,
            heartbeat_interval: 50.0,
            drop_first_session: None,
        }
    }
}

#[derive(Debug, Default)]
struct Record {
    received: Mutex<Vec<(usize, Opcode)>>,
    sessions: AtomicUsize,
    ws_closed: AtomicUsize,
    udp_packets: AtomicUsize,
    peer: Mutex<Option<SocketAddr>>,
}

pub(crate) struct TestServer {
    endpoint: String,
    record: Arc<Record>,
    udp: Arc<UdpSocket>,
    voice: flume::Receiver<Vec<u8>>,
    cipher: CipherSession,
}

impl TestServer {
    pub(crate) async fn start(script: Script) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let udp = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let endpoint = format!("ws://{}", listener.local_addr().unwrap());
        let udp_port = udp.local_addr().unwrap().port();

        let record = Arc::new(Record::default());
        let (voice_tx, voice) = flume::unbounded();

        tokio::spawn(serve_udp(
            udp.clone(),
            record.clone(),
            script.stall_discovery,
            voice_tx,
        ));

        let ws_record = record.clone();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let idx = ws_record.sessions.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_ws(
                    tcp,
                    idx,
                    udp_port,
                    script.clone(),
                    ws_record.clone(),
                ));
            }
        });

        let key = SecretKey::from_slice(&KEY).unwrap();

        Self {
            endpoint,
            record,
            udp,
            voice,
            cipher: CipherSession::new(&key, CryptoMode::Normal).unwrap(),
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn info(&self) -> ConnectionInfo {
        let id = |v| NonZeroU64::new(v).unwrap();

        ConnectionInfo {
            channel_id: Some(ChannelId::from(id(3))),
            endpoint: self.endpoint.clone(),
            guild_id: GuildId::from(id(2)),
            session_id: "session".into(),
            token: "token".into(),
            user_id: UserId::from(id(1)),
        }
    }

    /// Opcodes received on the `session`-th signaling connection, in order.
    pub(crate) fn received(&self, session: usize) -> Vec<Opcode> {
        self.record
            .received
            .lock()
            .iter()
            .filter(|(idx, _)| *idx == session)
            .map(|(_, op)| *op)
            .collect()
    }

    pub(crate) fn sessions(&self) -> usize {
        self.record.sessions.load(Ordering::SeqCst)
    }

    pub(crate) fn ws_closed(&self) -> usize {
        self.record.ws_closed.load(Ordering::SeqCst)
    }

    pub(crate) fn udp_packets(&self) -> usize {
        self.record.udp_packets.load(Ordering::SeqCst)
    }

    /// Waits until `n` signaling connections have ended.
    pub(crate) async fn wait_ws_closed(&self, n: usize) {
        timeout(Duration::from_secs(5), async {
            while self.ws_closed() < n {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    /// Waits for the next voice packet from the client, returning its sequence
    /// number and decrypted frame.
    pub(crate) async fn next_voice(&self) -> (u16, Vec<u8>) {
        let mut packet = timeout(Duration::from_secs(5), self.voice.recv_async())
            .await
            .unwrap()
            .unwrap();

        let mut rtp = MutableRtpPacket::new(&mut packet[..]).unwrap();
        let range = self.cipher.decrypt(&mut rtp).unwrap();
        let sequence = rtp.get_sequence().0 .0;

        (sequence, rtp.payload()[range].to_vec())
    }

    /// Sends `frame` to the client as the remote user's voice.
    pub(crate) async fn send_voice(&self, sequence: u16, frame: &[u8]) {
        let mut buf = [0u8; VOICE_PACKET_MAX];
        let len = self
            .cipher
            .encrypt(
                &mut CryptoState::Normal,
                RtpHeader {
                    sequence,
                    timestamp: u32::from(sequence) * MONO_FRAME_SIZE as u32,
                    ssrc: REMOTE_SSRC,
                },
                frame,
                &mut buf,
            )
            .unwrap();

        self.send_raw(&buf[..len]).await;
    }

    /// Sends a voice packet whose tag will not verify.
    pub(crate) async fn send_forged_voice(&self, sequence: u16) {
        let mut buf = [0u8; VOICE_PACKET_MAX];
        let len = self
            .cipher
            .encrypt(
                &mut CryptoState::Normal,
                RtpHeader {
                    sequence,
                    timestamp: 0,
                    ssrc: REMOTE_SSRC,
                },
                &[0xAA; 20],
                &mut buf,
            )
            .unwrap();
        buf[RtpPacket::minimum_packet_size()] ^= 0xFF;

        self.send_raw(&buf[..len]).await;
    }

    pub(crate) async fn send_raw(&self, bytes: &[u8]) {
        let peer = (*self.record.peer.lock()).unwrap();
        self.udp.send_to(bytes, peer).await.unwrap();
    }
}

fn text(op: Opcode, d: serde_json::Value) -> Message {
    Message::Text(serde_json::to_string(&Payload::new(op, d)).unwrap())
}

async fn serve_ws(tcp: TcpStream, idx: usize, udp_port: u16, script: Script, record: Arc<Record>) {
    let Ok(mut ws) = accept_async(tcp).await else {
        return;
    };

    let ssrc = FIRST_SSRC + idx as u32;
    let mode = CryptoMode::Normal.to_request_str();
    let ready = json!({
        "ssrc": ssrc,
        "ip": "127.0.0.1",
        "port": udp_port,
        "modes": [mode, "aead_aes256_gcm"],
    });

    let body = |op| match op {
        Opcode::Hello => json!({ "heartbeat_interval": script.heartbeat_interval }),
        Opcode::Ready => ready.clone(),
        Opcode::SessionDescription => json!({ "mode": mode, "secret_key": KEY.to_vec() }),
        _ => json!({}),
    };
    let reply = |op| text(op, body(op));

    let opener = reply(if script.ready_before_hello {
        Opcode::Ready
    } else {
        Opcode::Hello
    });

    if ws.send(opener).await.is_ok() {
        while let Some(Ok(msg)) = ws.next().await {
            let Message::Text(body) = msg else {
                if msg.is_close() {
                    break;
                }
                continue;
            };
            let Ok(p) = serde_json::from_str::<Payload>(&body) else {
                continue;
            };

            record.received.lock().push((idx, p.op));

            let replies = match p.op {
                Opcode::Identify => vec![reply(script.identify_reply)],
                Opcode::Heartbeat => vec![text(Opcode::HeartbeatAck, p.d.clone())],
                Opcode::SelectProtocol => vec![
                    reply(script.select_reply),
                    text(
                        Opcode::Speaking,
                        json!({
                            "speaking": 1,
                            "ssrc": REMOTE_SSRC,
                            "user_id": REMOTE_USER.to_string(),
                        }),
                    ),
                ],
                _ => vec![],
            };

            for reply in replies {
                if ws.send(reply).await.is_err() {
                    break;
                }
            }

            if let (Opcode::SelectProtocol, Some(code), 0) =
                (p.op, script.drop_first_session, idx)
            {
                sleep(Duration::from_millis(300)).await;
                drop(
                    ws.close(Some(CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    }))
                    .await,
                );

                // Hold the socket open until the client answers the close.
                while let Ok(Some(Ok(_))) = timeout(Duration::from_secs(1), ws.next()).await {}
                break;
            }
        }
    }

    record.ws_closed.fetch_add(1, Ordering::SeqCst);
}

async fn serve_udp(
    udp: Arc<UdpSocket>,
    record: Arc<Record>,
    stall_discovery: bool,
    voice_tx: flume::Sender<Vec<u8>>,
) {
    let mut buf = [0u8; 1500];

    while let Ok((len, from)) = udp.recv_from(&mut buf).await {
        record.udp_packets.fetch_add(1, Ordering::SeqCst);
        *record.peer.lock() = Some(from);

        let bytes = &buf[..len];
        match IpDiscoveryPacket::new(bytes) {
            Some(req)
                if len == IpDiscoveryPacket::const_packet_size()
                    && req.get_pkt_type() == IpDiscoveryType::Request =>
                if !stall_discovery {
                    let reply = response(req.get_ssrc(), "127.0.0.1", from.port());
                    drop(udp.send_to(&reply, from).await);
                },
            _ if len == UDP_KEEPALIVE_SIZE => {
                drop(udp.send_to(bytes, from).await);
            },
            _ => drop(voice_tx.send(bytes.to_vec())),
        }
    }
}
