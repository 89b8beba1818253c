//! Encryption schemes supported by Discord's secure RTP negotiation.
use crate::constants::*;
use byteorder::{ByteOrder, NetworkEndian};
use crypto_secretbox::{AeadInPlace, KeyInit, Nonce, SecretBox, Tag, XSalsa20Poly1305 as Cipher};
use discortp::{
    rtp::{MutableRtpPacket, RtpPacket},
    MutablePacket,
    Packet,
};
use rand::Rng;
use std::{fmt, num::Wrapping, ops::Range};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const TAG_SIZE: usize = SecretBox::<()>::TAG_SIZE;
pub const NONCE_SIZE: usize = SecretBox::<()>::NONCE_SIZE;

/// Per-packet encryption failures.
///
/// None of these are fatal to a connection: the offending packet is dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The packet is too short to hold the mode's tag and nonce.
    PacketTooSmall,
    /// The packet's tag did not verify under the session key.
    AuthenticationFailed,
    /// The frame would not fit in a single voice packet.
    FrameTooLarge,
    /// The server handed over a key of the wrong length.
    InvalidKeyLength,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PacketTooSmall => write!(f, "packet too small for encryption mode"),
            Error::AuthenticationFailed => write!(f, "packet failed authentication"),
            Error::FrameTooLarge => write!(f, "frame exceeds maximum voice packet size"),
            Error::InvalidKeyLength => write!(f, "secret key must be {KEY_SIZE} bytes"),
        }
    }
}

impl std::error::Error for Error {}

/// Variants of the XSalsa20Poly1305 encryption scheme.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CryptoMode {
    /// The RTP header is used as the source of nonce bytes for the packet.
    ///
    /// Equivalent to a nonce of at most 48b (6B) at no extra packet overhead:
    /// the RTP sequence number and timestamp are the varying quantities.
    Normal,
    /// An additional random 24B suffix is used as the source of nonce bytes for the packet.
    /// This is regenerated randomly for each packet.
    ///
    /// Full nonce width of 24B (192b), at an extra 24B per packet (~1.2 kB/s).
    Suffix,
    /// An additional random 4B suffix is used as the source of nonce bytes for the packet.
    /// This nonce value increments by `1` with each packet.
    ///
    /// Nonce width of 4B (32b), at an extra 4B per packet (~0.2 kB/s).
    Lite,
}

impl From<CryptoState> for CryptoMode {
    fn from(val: CryptoState) -> Self {
        use CryptoState::*;
        match val {
            Normal => CryptoMode::Normal,
            Suffix => CryptoMode::Suffix,
            Lite(_) => CryptoMode::Lite,
        }
    }
}

impl CryptoMode {
    /// Returns the name of a mode as it will appear during negotiation.
    pub fn to_request_str(self) -> &'static str {
        use CryptoMode::*;
        match self {
            Normal => "xsalsa20_poly1305",
            Suffix => "xsalsa20_poly1305_suffix",
            Lite => "xsalsa20_poly1305_lite",
        }
    }

    /// Returns the number of bytes each nonce is stored as within
    /// a packet.
    pub fn nonce_size(self) -> usize {
        use CryptoMode::*;
        match self {
            Normal => RtpPacket::minimum_packet_size(),
            Suffix => NONCE_SIZE,
            Lite => 4,
        }
    }

    /// Returns the number of bytes occupied by the encryption scheme
    /// which fall before the payload.
    pub fn payload_prefix_len(self) -> usize {
        TAG_SIZE
    }

    /// Returns the number of bytes occupied by the encryption scheme
    /// which fall after the payload.
    pub fn payload_suffix_len(self) -> usize {
        use CryptoMode::*;
        match self {
            Normal => 0,
            Suffix | Lite => self.nonce_size(),
        }
    }

    /// Calculates the number of additional bytes required compared
    /// to an unencrypted payload.
    pub fn payload_overhead(self) -> usize {
        self.payload_prefix_len() + self.payload_suffix_len()
    }

    /// Largest audio frame which fits into a single voice packet under this mode.
    pub fn max_frame_len(self) -> usize {
        VOICE_PACKET_MAX - RtpPacket::minimum_packet_size() - self.payload_overhead()
    }

    /// Extracts the byte slice in a packet used as the nonce, and the remaining mutable
    /// portion of the packet.
    fn nonce_slice<'a>(
        self,
        header: &'a [u8],
        body: &'a mut [u8],
    ) -> Result<(&'a [u8], &'a mut [u8]), Error> {
        use CryptoMode::*;
        match self {
            Normal => Ok((header, body)),
            Suffix | Lite => {
                let len = body.len();
                if len < self.payload_suffix_len() {
                    Err(Error::PacketTooSmall)
                } else {
                    let (body_left, nonce_loc) = body.split_at_mut(len - self.payload_suffix_len());
                    Ok((&nonce_loc[..self.nonce_size()], body_left))
                }
            },
        }
    }

    fn build_nonce(self, slice_to_use: &[u8]) -> Nonce {
        let mut nonce = Nonce::default();
        let take = slice_to_use.len().min(self.nonce_size()).min(NONCE_SIZE);
        nonce[..take].copy_from_slice(&slice_to_use[..take]);
        nonce
    }

    /// Decrypts a Discord RTP packet using the given key.
    ///
    /// If successful, this returns the number of bytes to be ignored from the
    /// start and end of the packet payload.
    #[inline]
    pub(crate) fn decrypt_in_place(
        self,
        packet: &mut impl MutablePacket,
        cipher: &Cipher,
    ) -> Result<(usize, usize), Error> {
        let header_len = packet.packet().len() - packet.payload().len();
        let (header, body) = packet.packet_mut().split_at_mut(header_len);
        let (slice_to_use, body_remaining) = self.nonce_slice(header, body)?;

        let nonce = self.build_nonce(slice_to_use);

        let body_start = self.payload_prefix_len();
        let body_tail = self.payload_suffix_len();

        if body_start > body_remaining.len() {
            return Err(Error::PacketTooSmall);
        }

        let (tag_bytes, data_bytes) = body_remaining.split_at_mut(body_start);
        let tag = Tag::from_slice(tag_bytes);

        cipher
            .decrypt_in_place_detached(&nonce, b"", data_bytes, tag)
            .map(|()| (body_start, body_tail))
            .map_err(|_| Error::AuthenticationFailed)
    }

    /// Encrypts a Discord RTP packet using the given key.
    ///
    /// Use of this requires that the input packet has had a nonce generated in the correct location,
    /// and `payload_len` specifies the number of bytes after the header including this nonce.
    #[inline]
    pub(crate) fn encrypt_in_place(
        self,
        packet: &mut impl MutablePacket,
        cipher: &Cipher,
        payload_len: usize,
    ) -> Result<(), Error> {
        let header_len = packet.packet().len() - packet.payload().len();
        let (header, body) = packet.packet_mut().split_at_mut(header_len);
        let (slice_to_use, body_remaining) = self.nonce_slice(header, &mut body[..payload_len])?;

        let nonce = self.build_nonce(slice_to_use);

        if body_remaining.len() < TAG_SIZE {
            return Err(Error::PacketTooSmall);
        }

        // The true payload to encrypt follows after the first TAG_SIZE bytes.
        let tag = cipher
            .encrypt_in_place_detached(&nonce, b"", &mut body_remaining[TAG_SIZE..])
            .map_err(|_| Error::AuthenticationFailed)?;
        body_remaining[..TAG_SIZE].copy_from_slice(&tag[..]);

        Ok(())
    }
}

/// Per-sender nonce state for an encryption mode.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CryptoState {
    Normal,
    Suffix,
    Lite(Wrapping<u32>),
}

impl From<CryptoMode> for CryptoState {
    fn from(val: CryptoMode) -> Self {
        use CryptoMode::*;
        match val {
            Normal => CryptoState::Normal,
            Suffix => CryptoState::Suffix,
            Lite => CryptoState::Lite(Wrapping(rand::random::<u32>())),
        }
    }
}

impl CryptoState {
    /// Writes packet nonce into the body, if required, returning the new length.
    pub fn write_packet_nonce(
        &mut self,
        packet: &mut impl MutablePacket,
        payload_end: usize,
    ) -> usize {
        let mode = self.kind();
        let endpoint = payload_end + mode.payload_suffix_len();

        use CryptoState::*;
        match self {
            Suffix => {
                rand::thread_rng().fill(&mut packet.payload_mut()[payload_end..endpoint]);
            },
            Lite(i) => {
                NetworkEndian::write_u32(&mut packet.payload_mut()[payload_end..endpoint], i.0);
                *i += Wrapping(1);
            },
            Normal => {},
        }

        endpoint
    }

    /// Returns the underlying (stateless) type of the active crypto mode.
    pub fn kind(&self) -> CryptoMode {
        CryptoMode::from(*self)
    }
}

/// A session's 32-byte secret key, wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Copies a key out of a received session description.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::InvalidKeyLength);
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<secret>)")
    }
}

/// Header fields for one outbound voice packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RtpHeader {
    /// RTP sequence number.
    pub sequence: u16,
    /// RTP timestamp, in samples.
    pub timestamp: u32,
    /// Synchronisation source of this session.
    pub ssrc: u32,
}

/// The negotiated key and mode of a voice session.
///
/// Set once per connection from the session description, then shared read-only
/// between the audio sender and receiver.
pub struct CipherSession {
    cipher: Cipher,
    mode: CryptoMode,
}

impl CipherSession {
    /// Creates a cipher session from a session key and negotiated mode.
    pub fn new(key: &SecretKey, mode: CryptoMode) -> Result<Self, Error> {
        let cipher = Cipher::new_from_slice(&key.0).map_err(|_| Error::InvalidKeyLength)?;
        Ok(Self { cipher, mode })
    }

    /// The encryption mode in use.
    pub fn mode(&self) -> CryptoMode {
        self.mode
    }

    /// Builds an encrypted voice packet carrying `frame` into `buf`, returning
    /// the length of the finished packet.
    ///
    /// `state` supplies the per-packet nonce for the suffix and lite modes; under
    /// the normal mode the header itself is the nonce.
    pub fn encrypt(
        &self,
        state: &mut CryptoState,
        header: RtpHeader,
        frame: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        let packet_len = RtpPacket::minimum_packet_size() + self.mode.payload_overhead() + frame.len();
        if frame.len() > self.mode.max_frame_len() || buf.len() < packet_len {
            return Err(Error::FrameTooLarge);
        }

        let buf = &mut buf[..packet_len];
        buf.fill(0);

        let mut rtp = MutableRtpPacket::new(buf).ok_or(Error::PacketTooSmall)?;
        rtp.set_version(RTP_VERSION);
        rtp.set_payload_type(RTP_PROFILE_TYPE);
        rtp.set_sequence(header.sequence.into());
        rtp.set_timestamp(header.timestamp.into());
        rtp.set_ssrc(header.ssrc);

        let body_end = TAG_SIZE + frame.len();
        rtp.payload_mut()[TAG_SIZE..body_end].copy_from_slice(frame);

        let final_payload_size = state.write_packet_nonce(&mut rtp, body_end);
        self.mode
            .encrypt_in_place(&mut rtp, &self.cipher, final_payload_size)?;

        Ok(RtpPacket::minimum_packet_size() + final_payload_size)
    }

    /// Decrypts a voice packet in place, returning the range of `packet`'s payload
    /// which holds the audio frame.
    pub fn decrypt(&self, packet: &mut MutableRtpPacket<'_>) -> Result<Range<usize>, Error> {
        let (start, tail) = self.mode.decrypt_in_place(packet, &self.cipher)?;
        let end = packet.payload().len() - tail;

        Ok(start..end)
    }
}

impl fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSession")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
