use crate::driver::{retry::Retry, CryptoMode};
use std::time::Duration;

/// Configuration for drivers and their voice connections.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Config {
    /// Selected tagging mode for voice packet encryption.
    ///
    /// Defaults to [`CryptoMode::Normal`].
    ///
    /// Changes to this field will not immediately apply if the
    /// driver is actively connected, but will apply to subsequent
    /// sessions.
    ///
    /// [`CryptoMode::Normal`]: CryptoMode::Normal
    pub crypto_mode: CryptoMode,

    /// Configures the maximum amount of time to wait for an attempted voice
    /// connection to Discord.
    ///
    /// Defaults to 10 seconds. If set to `None`, connections will never time out.
    pub driver_timeout: Option<Duration>,

    /// Configures how long each handshake step may wait for the server's reply
    /// (Hello, Ready, and Session Description).
    ///
    /// Defaults to 5 seconds.
    pub payload_timeout: Duration,

    /// Configures how long to wait for a reply to UDP IP discovery.
    ///
    /// Defaults to 5 seconds.
    pub discovery_timeout: Duration,

    /// Delay between UDP keepalive packets.
    ///
    /// Defaults to [`UDP_KEEPALIVE_GAP`].
    ///
    /// [`UDP_KEEPALIVE_GAP`]: crate::constants::UDP_KEEPALIVE_GAP
    pub udp_keepalive_gap: Duration,

    /// Connection retry logic for the [`Driver`].
    ///
    /// This controls how many times the [`Driver`] should retry any connections,
    /// as well as how long to wait between attempts.
    ///
    /// [`Driver`]: crate::driver::Driver
    pub driver_retry: Retry,

    /// Number of received voice packets to hold for the application before
    /// newer packets are dropped.
    ///
    /// Defaults to 64 packets (~1.3s of audio per speaker).
    pub inbound_buffer: usize,

    /// Number of outbound Opus frames the application may queue ahead of the
    /// 20ms send clock before [`Driver::audio_sender`] applies backpressure.
    ///
    /// Defaults to 8 frames.
    ///
    /// [`Driver::audio_sender`]: crate::driver::Driver::audio_sender
    pub outbound_buffer: usize,

    /// Configures whether voice packets from SSRCs which have not been tied to a
    /// user (via a speaking state update) are dropped.
    ///
    /// Defaults to `true`.
    pub filter_unknown_ssrcs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crypto_mode: CryptoMode::Normal,
            driver_timeout: Some(Duration::from_secs(10)),
            payload_timeout: Duration::from_secs(5),
            discovery_timeout: Duration::from_secs(5),
            udp_keepalive_gap: crate::constants::UDP_KEEPALIVE_GAP,
            driver_retry: Retry::default(),
            inbound_buffer: 64,
            outbound_buffer: 8,
            filter_unknown_ssrcs: true,
        }
    }
}

impl Config {
    /// Sets this `Config`'s chosen cryptographic tagging scheme.
    #[must_use]
    pub fn crypto_mode(mut self, crypto_mode: CryptoMode) -> Self {
        self.crypto_mode = crypto_mode;
        self
    }

    /// Sets this `Config`'s timeout for establishing a voice connection.
    #[must_use]
    pub fn driver_timeout(mut self, driver_timeout: Option<Duration>) -> Self {
        self.driver_timeout = driver_timeout;
        self
    }

    /// Sets this `Config`'s timeout for each handshake reply.
    #[must_use]
    pub fn payload_timeout(mut self, payload_timeout: Duration) -> Self {
        self.payload_timeout = payload_timeout;
        self
    }

    /// Sets this `Config`'s timeout for IP discovery.
    #[must_use]
    pub fn discovery_timeout(mut self, discovery_timeout: Duration) -> Self {
        self.discovery_timeout = discovery_timeout;
        self
    }

    /// Sets this `Config`'s delay between UDP keepalives.
    #[must_use]
    pub fn udp_keepalive_gap(mut self, udp_keepalive_gap: Duration) -> Self {
        self.udp_keepalive_gap = udp_keepalive_gap;
        self
    }

    /// Sets this `Config`'s voice connection retry configuration.
    #[must_use]
    pub fn driver_retry(mut self, driver_retry: Retry) -> Self {
        self.driver_retry = driver_retry;
        self
    }

    /// Sets this `Config`'s capacity for buffered inbound voice packets.
    #[must_use]
    pub fn inbound_buffer(mut self, inbound_buffer: usize) -> Self {
        self.inbound_buffer = inbound_buffer;
        self
    }

    /// Sets this `Config`'s capacity for queued outbound audio frames.
    #[must_use]
    pub fn outbound_buffer(mut self, outbound_buffer: usize) -> Self {
        self.outbound_buffer = outbound_buffer;
        self
    }

    /// Sets whether this `Config` drops audio from unidentified SSRCs.
    #[must_use]
    pub fn filter_unknown_ssrcs(mut self, filter_unknown_ssrcs: bool) -> Self {
        self.filter_unknown_ssrcs = filter_unknown_ssrcs;
        self
    }
}
