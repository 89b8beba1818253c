#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
//! Skylark is an async client for a single Discord voice session, written in Rust.
//!
//! Given the [`ConnectionInfo`] your gateway client gathers from its voice
//! state and voice server updates, a [`Driver`]:
//!  * performs the signaling handshake, IP discovery, and encryption negotiation,
//!  * keeps both the signaling websocket and UDP media channel alive with heartbeats,
//!  * sends your Opus frames as encrypted RTP every 20ms, and hands back decrypted
//!  voice from other users in the call,
//!  * recovers from network failures with a configurable back-off, reporting every
//!  change of state via [events] and a [status watch].
//!
//! Audio is opaque to the driver: encoding, decoding, and mixing are left to
//! the application.
//!
//! ```no_run
//! # use skylark::{ConnectionInfo, Driver};
//! # async fn run(info: ConnectionInfo, frame: bytes::Bytes) -> skylark::error::ConnectionResult<()> {
//! let mut driver = Driver::default();
//! driver.connect(info).await?;
//!
//! driver.speaking(true);
//! driver.audio_sender().send_async(frame).await.ok();
//!
//! driver.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! [events]: crate::events
//! [status watch]: Driver::watch_status
//! [`ConnectionInfo`]: struct@ConnectionInfo

#![warn(clippy::pedantic)]
#![allow(
    // Allowed as they are too pedantic
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::too_many_lines,
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    // TODO: would require significant rewriting of all existing docs
    clippy::missing_errors_doc,
)]

mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod events;
pub mod id;
pub(crate) mod info;
pub mod model;
mod ws;

pub use discortp as packet;

pub use crate::{
    driver::Driver,
    events::{CoreEvent, Event, EventContext, EventHandler},
};

pub use config::Config;
pub use info::ConnectionInfo;
