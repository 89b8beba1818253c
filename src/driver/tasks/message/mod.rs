#![allow(missing_docs)]

mod core;
mod events;
mod sender;
mod udp_tx;
mod ws;

pub use self::{core::*, events::*, sender::*, udp_tx::*, ws::*};

use super::error::Error as TaskError;
use crate::{
    driver::{heartbeat::HeartbeatStats, VoicePacket},
    id::UserId,
    model::Payload,
};
use bytes::Bytes;
use dashmap::DashMap;
use flume::{Receiver, Sender};
use std::sync::Arc;

/// Everything a connection's tasks can report to the supervisor.
#[derive(Debug)]
pub enum ConnEvent {
    /// A control message no task consumed itself.
    Payload(Payload),
    /// A fatal error, ending the connection.
    Error(TaskError),
}

/// Channels and shared state which outlive any single connection.
#[derive(Clone, Debug)]
pub struct Interconnect {
    pub events: Sender<EventMessage>,
    pub audio_out: Receiver<Bytes>,
    pub audio_in: Sender<VoicePacket>,
    pub ssrc_users: Arc<DashMap<u32, UserId>>,
    pub ws_heartbeat: Arc<HeartbeatStats>,
    pub udp_heartbeat: Arc<HeartbeatStats>,
}

impl Interconnect {
    /// Clears per-session state ahead of a new handshake.
    pub fn reset_session(&self) {
        self.ssrc_users.clear();
        self.ws_heartbeat.reset();
        self.udp_heartbeat.reset();
    }

    pub fn poison(&self) {
        drop(self.events.send(EventMessage::Poison));
    }
}
