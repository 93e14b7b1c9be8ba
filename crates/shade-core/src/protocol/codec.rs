//! Binary codec for motor bus frames.
//!
//! Wire format:
//! ```text
//! !([msg_id][ack|len][node_type][src:3][dst:3][payload:N])  [checksum:2 BE]
//! ```
//! `!` is the byte-wise one's complement applied to every header and payload
//! byte.  The checksum is the 16-bit wrapping sum of the *inverted* bytes and
//! is itself sent without inversion.
//!
//! Inversion and checksumming are plain functions over byte slices so the
//! ordering (invert, then sum; never invert the sum) can be tested on its own.

use std::fmt;
use std::io::{self, Read};

use thiserror::Error;

use crate::protocol::messages::{
    MessageFrame, MessageHeader, ACK_REQUIRED_BIT, CHECKSUM_SIZE, FRAME_OVERHEAD, HEADER_SIZE,
    LENGTH_MASK, MAX_PAYLOAD_LEN,
};

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The byte slice is shorter than the frame it claims to hold.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    /// The length field is smaller than the fixed 11-byte overhead.
    #[error("invalid frame length field: {0} (minimum is 11)")]
    InvalidLength(u8),

    /// The payload does not fit the 5-bit length field.
    #[error("payload of {len} bytes exceeds the maximum of {max}")]
    PayloadTooLong { len: usize, max: usize },

    /// The header's length field disagrees with the payload being encoded.
    #[error("length field says {declared} payload bytes, payload has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// The received checksum does not match the sum of the received bytes.
    #[error("checksum mismatch: received 0x{received:04X}, expected 0x{expected:04X}")]
    ChecksumMismatch { received: u16, expected: u16 },

    /// A payload could not be parsed (too short, value out of range).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The underlying stream failed or ended before a full frame arrived.
    #[error("link I/O error: {0}")]
    Io(#[from] io::Error),
}

// ── Byte transforms ───────────────────────────────────────────────────────────

/// Returns the one's complement of every byte.
pub fn invert(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| !b).collect()
}

/// Complements every byte in place.
pub fn invert_in_place(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b = !*b;
    }
}

/// 16-bit wrapping sum of `bytes`, big-endian.
pub fn checksum(bytes: &[u8]) -> [u8; 2] {
    bytes
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
        .to_be_bytes()
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Serializes `header` and `payload` into wire bytes.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLong`] for payloads over 20 bytes and
/// [`FrameError::LengthMismatch`] when `header.payload_length` is not
/// `11 + payload.len()`.
///
/// # Examples
///
/// ```rust
/// use shade_core::protocol::codec::{decode_frame, encode};
/// use shade_core::protocol::messages::{MessageFrame, MessageId};
/// use shade_core::MotorAddress;
///
/// let frame = MessageFrame::outgoing(
///     MessageId::GetMotorPosition, false, MotorAddress::new([1, 2, 3]), vec![],
/// ).unwrap();
/// let bytes = encode(&frame.header, &frame.payload).unwrap();
/// let (decoded, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode(header: &MessageHeader, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    let declared = header.payload_size()?;
    if declared != payload.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.push(header.message_id);
    buf.push(header.ack_length_byte());
    buf.push(header.node_type);
    buf.extend_from_slice(&header.source);
    buf.extend_from_slice(&header.destination);
    buf.extend_from_slice(payload);

    invert_in_place(&mut buf);
    let sum = checksum(&buf);
    buf.extend_from_slice(&sum);
    Ok(buf)
}

/// Serializes a [`MessageFrame`]; see [`encode`].
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_frame(frame: &MessageFrame) -> Result<Vec<u8>, FrameError> {
    encode(&frame.header, &frame.payload)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed.
///
/// # Errors
///
/// - [`FrameError::Truncated`] if `bytes` ends before the frame does.
/// - [`FrameError::InvalidLength`] if the length field is below 11.
/// - [`FrameError::ChecksumMismatch`] if the trailer does not match.
pub fn decode_frame(bytes: &[u8]) -> Result<(MessageFrame, usize), FrameError> {
    require_len(bytes, HEADER_SIZE)?;

    let header = parse_header(&bytes[..HEADER_SIZE]);
    let body_len = HEADER_SIZE + header.payload_size()?;
    let total = body_len + CHECKSUM_SIZE;
    require_len(bytes, total)?;

    // Sum the bytes as they appeared on the wire, i.e. still inverted.
    let expected = u16::from_be_bytes(checksum(&bytes[..body_len]));
    let received = u16::from_be_bytes([bytes[body_len], bytes[body_len + 1]]);
    if received != expected {
        return Err(FrameError::ChecksumMismatch { received, expected });
    }

    let payload = invert(&bytes[HEADER_SIZE..body_len]);
    Ok((MessageFrame { header, payload }, total))
}

/// Reads exactly one frame's raw wire bytes from `reader`.
///
/// The header is read first to learn the frame length; the rest is then read
/// in one go.  No checksum verification happens here.
///
/// # Errors
///
/// Returns [`FrameError::Io`] on timeout, EOF, or any other read failure,
/// and [`FrameError::InvalidLength`] for a length field below 11.
pub fn read_frame_bytes<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut buf = vec![0u8; HEADER_SIZE];
    reader.read_exact(&mut buf)?;

    let payload_len = parse_header(&buf).payload_size()?;

    buf.resize(HEADER_SIZE + payload_len + CHECKSUM_SIZE, 0);
    reader.read_exact(&mut buf[HEADER_SIZE..])?;
    Ok(buf)
}

/// Reads and decodes one frame from `reader`.
///
/// # Errors
///
/// Any error from [`read_frame_bytes`] or [`decode_frame`].
pub fn decode_from<R: Read + ?Sized>(reader: &mut R) -> Result<MessageFrame, FrameError> {
    let raw = read_frame_bytes(reader)?;
    let (frame, _) = decode_frame(&raw)?;
    Ok(frame)
}

/// Space-separated uppercase hex for log lines and error messages.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

// ── Utility helpers ───────────────────────────────────────────────────────────

/// Recovers the header fields from the first `HEADER_SIZE` wire bytes.
fn parse_header(wire: &[u8]) -> MessageHeader {
    let mut plain = [0u8; HEADER_SIZE];
    plain.copy_from_slice(&wire[..HEADER_SIZE]);
    invert_in_place(&mut plain);

    MessageHeader {
        message_id: plain[0],
        ack_required: plain[1] & ACK_REQUIRED_BIT != 0,
        payload_length: plain[1] & LENGTH_MASK,
        node_type: plain[2],
        source: [plain[3], plain[4], plain[5]],
        destination: [plain[6], plain[7], plain[8]],
    }
}

fn require_len(buf: &[u8], needed: usize) -> Result<(), FrameError> {
    if buf.len() < needed {
        Err(FrameError::Truncated {
            needed,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
