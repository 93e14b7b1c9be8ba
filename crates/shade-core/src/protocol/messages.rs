//! Message types carried by the motor bus protocol.
//!
//! Logical frame layout (before inversion on encode, after inversion removal
//! on decode):
//!
//! ```text
//! [msg_id:1][ack:1|len:5][node_type:1][src:3][dst:3][payload:0..20][checksum:2 BE]
//! ```
//!
//! `len` counts the whole frame: 9 header bytes, the payload, and the 2
//! checksum bytes.  The top bit of the same byte is the "ACK required" flag.

use crate::domain::address::MotorAddress;
use crate::protocol::codec::FrameError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 9;

/// Size of the trailing checksum in bytes.
pub const CHECKSUM_SIZE: usize = 2;

/// Header plus checksum: the value of the length field for an empty payload.
pub const FRAME_OVERHEAD: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload the 5-bit length field can describe (`0x1F - 11`).
pub const MAX_PAYLOAD_LEN: usize = LENGTH_MASK as usize - FRAME_OVERHEAD;

/// Source address used by this controller in every frame it sends.
pub const CONTROLLER_ADDRESS: [u8; 3] = [0x7F, 0x7F, 0x7F];

/// Node type sent by this controller.
pub const CONTROLLER_NODE_TYPE: u8 = 0x00;

/// High bit of the combined ack/length byte.
pub const ACK_REQUIRED_BIT: u8 = 0x80;

/// Low five bits of the combined ack/length byte.
pub const LENGTH_MASK: u8 = 0x1F;

/// Error code reported for a NACK that carries no payload.
pub const UNKNOWN_NACK_CODE: u8 = 0xFF;

// ── Message identifiers ───────────────────────────────────────────────────────

/// Message identifiers this controller sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    /// Move to an absolute position (controller → motor).
    MoveTo = 0x03,
    /// Ask the motor for its position (controller → motor).
    GetMotorPosition = 0x0C,
    /// Position report (motor → controller).
    PostMotorPosition = 0x0D,
    /// Command rejected (motor → controller).
    Nack = 0x6F,
    /// Command accepted (motor → controller).
    Ack = 0x7F,
}

impl TryFrom<u8> for MessageId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x03 => Ok(MessageId::MoveTo),
            0x0C => Ok(MessageId::GetMotorPosition),
            0x0D => Ok(MessageId::PostMotorPosition),
            0x6F => Ok(MessageId::Nack),
            0x7F => Ok(MessageId::Ack),
            _ => Err(()),
        }
    }
}

// ── Header and frame ──────────────────────────────────────────────────────────

/// The 9-byte frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Raw message identifier; see [`MessageId`] for the known values.
    pub message_id: u8,
    /// Whether the receiver must answer with ACK or NACK.
    pub ack_required: bool,
    /// Total frame length as carried in the low 5 bits (header + payload + checksum).
    ///
    /// The name follows the wire layout's label for this field; it is
    /// `11 + payload.len()`, not the payload size.  Use
    /// [`MessageHeader::payload_size`] for the latter.
    pub payload_length: u8,
    /// Sender node type.
    pub node_type: u8,
    /// Sender address, wire order.
    pub source: [u8; 3],
    /// Receiver address, wire order.
    pub destination: [u8; 3],
}

impl MessageHeader {
    /// The known message kind, if any.
    pub fn kind(&self) -> Option<MessageId> {
        MessageId::try_from(self.message_id).ok()
    }

    /// Number of payload bytes implied by the length field.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidLength`] when the field is smaller than
    /// the fixed overhead.
    pub fn payload_size(&self) -> Result<usize, FrameError> {
        (self.payload_length as usize)
            .checked_sub(FRAME_OVERHEAD)
            .ok_or(FrameError::InvalidLength(self.payload_length))
    }

    /// The combined byte: ack flag in the high bit, length in the low 5 bits.
    pub fn ack_length_byte(&self) -> u8 {
        let ack = if self.ack_required { ACK_REQUIRED_BIT } else { 0 };
        ack | (self.payload_length & LENGTH_MASK)
    }
}

/// A header together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    pub header: MessageHeader,
    pub payload: Vec<u8>,
}

impl MessageFrame {
    /// Builds a controller-originated frame addressed to `destination`.
    ///
    /// The length field is derived from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLong`] when `payload` exceeds
    /// [`MAX_PAYLOAD_LEN`].
    pub fn outgoing(
        id: MessageId,
        ack_required: bool,
        destination: MotorAddress,
        payload: Vec<u8>,
    ) -> Result<Self, FrameError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self {
            header: MessageHeader {
                message_id: id as u8,
                ack_required,
                payload_length: (FRAME_OVERHEAD + payload.len()) as u8,
                node_type: CONTROLLER_NODE_TYPE,
                source: CONTROLLER_ADDRESS,
                destination: destination.wire_bytes(),
            },
            payload,
        })
    }

    /// The known message kind, if any.
    pub fn kind(&self) -> Option<MessageId> {
        self.header.kind()
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Payload of a [`MessageId::MoveTo`] command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTo {
    /// Target in the device convention (percent closed).
    pub target: u16,
}

impl MoveTo {
    /// Function code selecting "move to percentage".
    pub const FUNCTION_PERCENT: u8 = 0x04;

    pub fn percent(target: u8) -> Self {
        Self {
            target: u16::from(target),
        }
    }

    /// `[function][target:2 LE][reserved]`
    pub fn encode(&self) -> Vec<u8> {
        let [lo, hi] = self.target.to_le_bytes();
        vec![Self::FUNCTION_PERCENT, lo, hi, 0x00]
    }
}

/// Payload of a [`MessageId::PostMotorPosition`] report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorPositionReport {
    /// Position in motor encoder pulses.
    pub pulse_position: u16,
    /// Position in percent closed.
    pub percentage_closed: u8,
    pub reserved: u8,
    /// Current intermediate position index.
    pub ip: u8,
}

impl MotorPositionReport {
    pub const SIZE: usize = 5;

    /// Decodes `[pulse:2 LE][percent][reserved][ip]`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::MalformedPayload`] when fewer than 5 bytes are present.
    pub fn decode(p: &[u8]) -> Result<Self, FrameError> {
        if p.len() < Self::SIZE {
            return Err(FrameError::MalformedPayload(format!(
                "PostMotorPosition: need {} bytes, got {}",
                Self::SIZE,
                p.len()
            )));
        }
        Ok(Self {
            pulse_position: u16::from_le_bytes([p[0], p[1]]),
            percentage_closed: p[2],
            reserved: p[3],
            ip: p[4],
        })
    }
}

/// Error code carried by a NACK: its first payload byte, or
/// [`UNKNOWN_NACK_CODE`] if the payload is empty.
pub fn nack_error_code(payload: &[u8]) -> u8 {
    payload.first().copied().unwrap_or(UNKNOWN_NACK_CODE)
}
