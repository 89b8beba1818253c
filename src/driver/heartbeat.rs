//! Liveness information for the signaling and media channels.
//!
//! The driver never declares a peer dead on its own: how much staleness to
//! tolerate is left to the application, via [`Driver::heartbeats`].
//!
//! [`Driver::heartbeats`]: crate::Driver::heartbeats

use parking_lot::Mutex;
use std::time::{Duration, SystemTime};

/// A snapshot of one heartbeat monitor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct HeartbeatInfo {
    /// When the monitor for the current session was started.
    pub started_at: Option<SystemTime>,
    /// Nonce of the most recent heartbeat sent.
    pub last_nonce: Option<u64>,
    /// When the most recent heartbeat was sent.
    pub last_sent: Option<SystemTime>,
    /// When the most recent matching acknowledgement arrived.
    pub last_ack: Option<SystemTime>,
}

impl HeartbeatInfo {
    /// Time since the peer last proved it was alive.
    ///
    /// This counts from the last acknowledgement, or from monitor start if none
    /// has arrived yet. Returns `None` when no monitor is running.
    #[must_use]
    pub fn staleness(&self) -> Option<Duration> {
        let since = self.last_ack.or(self.started_at)?;
        Some(SystemTime::now().duration_since(since).unwrap_or_default())
    }
}

/// Heartbeat snapshots for both halves of a voice connection.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct Heartbeats {
    /// Signaling channel heartbeats, paced by the server's Hello.
    pub ws: HeartbeatInfo,
    /// UDP keepalives on the media channel.
    pub udp: HeartbeatInfo,
}

/// Shared record written by a heartbeat monitor and its ack path.
#[derive(Debug, Default)]
pub(crate) struct HeartbeatStats {
    inner: Mutex<HeartbeatInfo>,
}

impl HeartbeatStats {
    pub(crate) fn reset(&self) {
        *self.inner.lock() = HeartbeatInfo::default();
    }

    pub(crate) fn start(&self) {
        self.inner.lock().started_at = Some(SystemTime::now());
    }

    pub(crate) fn record_send(&self, nonce: u64) {
        let mut info = self.inner.lock();
        info.last_nonce = Some(nonce);
        info.last_sent = Some(SystemTime::now());
    }

    /// Records an acknowledgement, returning `false` if it does not match the
    /// last heartbeat sent.
    pub(crate) fn record_ack(&self, nonce: u64) -> bool {
        let mut info = self.inner.lock();
        if info.last_nonce == Some(nonce) {
            info.last_ack = Some(SystemTime::now());
            true
        } else {
            false
        }
    }

    pub(crate) fn snapshot(&self) -> HeartbeatInfo {
        *self.inner.lock()
    }
}
