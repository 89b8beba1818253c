use crate::id::UserId;
use bytes::Bytes;

/// A decrypted voice packet received from another user in the call.
///
/// The payload is an opaque audio frame (typically Opus), with any RTP header
/// extension already stripped.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct VoicePacket {
    /// Synchronisation source the packet was sent under.
    pub ssrc: u32,
    /// The user tied to `ssrc` by a speaking state update, if known.
    pub user_id: Option<UserId>,
    /// RTP sequence number.
    pub sequence: u16,
    /// RTP timestamp, in samples.
    pub timestamp: u32,
    /// The decrypted audio frame.
    pub payload: Bytes,
}
