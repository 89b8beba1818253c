//! Typed bodies of the control messages this library sends and understands.

use super::{Opcode, Outgoing, SpeakingState};
use crate::id::{GuildId, UserId};
use serde::{Deserialize, Serialize};
use std::{fmt, net::IpAddr};

/// Sent by the server on connection, defining the heartbeat cadence.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Hello {
    /// Milliseconds between client heartbeats.
    pub heartbeat_interval: f64,
}

/// Client credentials, sent once the server has said Hello.
#[derive(Clone, Deserialize, Serialize)]
pub struct Identify {
    /// Guild (server) the voice session lives in.
    pub server_id: GuildId,
    /// Session ID, from the main gateway's voice state update.
    pub session_id: String,
    /// Voice token, from the main gateway's voice server update.
    pub token: String,
    /// ID of this user.
    pub user_id: UserId,
}

impl Outgoing for Identify {
    const OPCODE: Opcode = Opcode::Identify;
}

impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("server_id", &self.server_id)
            .field("session_id", &self.session_id)
            .field("token", &"<secret>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Session accepted: where to send media, and under which SSRC.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Ready {
    /// Synchronisation source assigned to this session.
    pub ssrc: u32,
    /// Address of the media server.
    pub ip: IpAddr,
    /// UDP port of the media server.
    pub port: u16,
    /// Encryption modes the server accepts.
    #[serde(default)]
    pub modes: Vec<String>,
}

/// Transport selection, sent after address discovery.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SelectProtocol {
    /// Always `"udp"`.
    pub protocol: String,
    /// Our externally visible endpoint and chosen mode.
    pub data: ProtocolData,
}

impl Outgoing for SelectProtocol {
    const OPCODE: Opcode = Opcode::SelectProtocol;
}

/// Body of a [`SelectProtocol`] message.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProtocolData {
    /// Externally visible address, as learned through IP discovery.
    pub address: IpAddr,
    /// Encryption mode, e.g. `"xsalsa20_poly1305"`.
    pub mode: String,
    /// Externally visible port, as learned through IP discovery.
    pub port: u16,
}

/// Final handshake message, carrying the session's secret key.
#[derive(Clone, Deserialize, Serialize)]
pub struct SessionDescription {
    /// The encryption mode the server has agreed to.
    pub mode: String,
    /// 32-byte symmetric key.
    pub secret_key: Vec<u8>,
}

impl fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescription")
            .field("mode", &self.mode)
            .field("secret_key", &"<secret>")
            .finish()
    }
}

/// Speaking state of a client.
///
/// Outbound, this announces our own state; inbound, it ties another user
/// to the SSRC their audio arrives under.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Speaking {
    /// Delay before audio starts, always zero for bots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    /// Kind of audio being sent.
    pub speaking: SpeakingState,
    /// SSRC the audio will be sent under.
    pub ssrc: u32,
    /// Speaking user, only present on inbound messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

impl Outgoing for Speaking {
    const OPCODE: Opcode = Opcode::Speaking;
}

/// Keepalive sent by the client; the server echoes the nonce in a [`HeartbeatAck`].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Heartbeat {
    /// Sequence number of this heartbeat.
    pub nonce: u64,
}

impl Outgoing for Heartbeat {
    const OPCODE: Opcode = Opcode::Heartbeat;
}

/// Acknowledgement of a [`Heartbeat`].
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HeartbeatAck {
    /// Nonce of the heartbeat being acknowledged.
    pub nonce: u64,
}

/// Another client has left the call.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClientDisconnect {
    /// The departing user.
    pub user_id: UserId,
}
