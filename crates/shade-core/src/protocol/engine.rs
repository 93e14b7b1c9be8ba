//! ProtocolEngine: drives send / await-response cycles for one motor.
//!
//! # Command lifecycle (for beginners)
//!
//! A move command requires an acknowledgment.  Each call walks this state
//! machine and always ends in one of the two terminal states:
//!
//! ```text
//! Idle ──► Sending ──► AwaitingResponse ──► Success        (ACK)
//!             ▲                │
//!             │   NACK, wait 1s│
//!             └────────────────┤
//!                              └──────────► Failed         (NACK on last attempt,
//!                                                           unexpected reply,
//!                                                           link/codec error)
//! ```
//!
//! Only a NACK is retried.  Every other failure is returned on first
//! occurrence, and nothing carries over to the next call except the
//! timestamp of the last write (see [`crate::protocol::pacing`]).  A failed
//! read also drops whatever input is left on the link, so the next call
//! reads from a frame boundary.
//!
//! # Concurrency
//!
//! The engine takes `&mut self` for every command and has no interior
//! locking.  Callers that share one engine between threads must hold an
//! exclusive lock for the whole call, retries included.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::address::MotorAddress;
use crate::domain::position::{Position, PositionError};
use crate::link::Transport;
use crate::protocol::codec::{self, FrameError, HexBytes};
use crate::protocol::messages::{
    nack_error_code, MessageFrame, MessageId, MotorPositionReport, MoveTo,
};
use crate::protocol::pacing::{Clock, SendPacer, SystemClock};

/// Default number of transmissions of one move command (1 initial + 2 retries).
pub const DEFAULT_MAX_ATTEMPTS: u8 = 3;

/// Default pause after a NACK before retransmitting.
pub const DEFAULT_NACK_BACKOFF: Duration = Duration::from_secs(1);

/// Errors surfaced by [`ProtocolEngine`] operations.
#[derive(Debug, Error)]
pub enum MotorError {
    /// The requested position is outside 0-100.  Nothing was transmitted.
    #[error("position {position} is outside the range 0-100")]
    Validation { position: i64 },

    /// The link failed to write, timed out, or closed mid-frame.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// A response arrived with a checksum that does not match its contents.
    #[error("response checksum mismatch: received 0x{received:04X}, expected 0x{expected:04X}")]
    Checksum { received: u16, expected: u16 },

    /// A response had an impossible length or an unparseable payload.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The motor answered with a message this command does not expect.
    #[error("unexpected message ID 0x{message_id:02X} in response: {raw}")]
    Protocol { message_id: u8, raw: String },

    /// Every attempt was answered with a NACK.
    #[error("motor rejected the command {attempts} times, final error code 0x{error_code:02X}")]
    MaxRetriesExceeded { attempts: u8, error_code: u8 },
}

impl From<FrameError> for MotorError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(source) => MotorError::Transport(source),
            FrameError::ChecksumMismatch { received, expected } => {
                MotorError::Checksum { received, expected }
            }
            other => MotorError::MalformedFrame(other.to_string()),
        }
    }
}

impl From<PositionError> for MotorError {
    fn from(e: PositionError) -> Self {
        match e {
            PositionError::OutOfRange(position) => MotorError::Validation { position },
            PositionError::DeviceOutOfRange(_) => MotorError::MalformedFrame(e.to_string()),
        }
    }
}

/// How often and how patiently a NACKed move command is retransmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total transmissions allowed, including the first.  Minimum 1.
    pub max_attempts: u8,
    /// Pause between a NACK and the next transmission.
    pub nack_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            nack_backoff: DEFAULT_NACK_BACKOFF,
        }
    }
}

/// A response frame together with the bytes it arrived as.
struct Response {
    frame: MessageFrame,
    raw: Vec<u8>,
}

/// Protocol engine for a single motor on an exclusively owned link.
///
/// One instance per physical device.  The address and the pacing state live
/// as long as the engine; retry counters live for one call.
pub struct ProtocolEngine<T, C = SystemClock> {
    link: T,
    address: MotorAddress,
    pacer: SendPacer<C>,
    retry: RetryPolicy,
}

impl<T: Transport> ProtocolEngine<T, SystemClock> {
    /// Creates an engine over an already-open link using real time.
    pub fn new(link: T, address: MotorAddress) -> Self {
        Self::with_clock(link, address, SystemClock)
    }
}

impl<T: Transport, C: Clock> ProtocolEngine<T, C> {
    /// Creates an engine that reads time from `clock`.
    pub fn with_clock(link: T, address: MotorAddress, clock: C) -> Self {
        Self {
            link,
            address,
            pacer: SendPacer::new(clock),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.  `max_attempts` of 0 is treated as 1.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryPolicy {
            max_attempts: policy.max_attempts.max(1),
            ..policy
        };
        self
    }

    pub fn address(&self) -> MotorAddress {
        self.address
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Moves the shade to `position` percent open and waits for the ACK.
    ///
    /// # Errors
    ///
    /// - [`MotorError::Validation`] if `position` is outside 0-100; nothing is sent.
    /// - [`MotorError::MaxRetriesExceeded`] if every attempt is NACKed.
    /// - [`MotorError::Protocol`] if the reply is neither ACK nor NACK.
    /// - [`MotorError::Transport`], [`MotorError::Checksum`],
    ///   [`MotorError::MalformedFrame`] from the link and codec.
    pub fn set_position(&mut self, position: i32) -> Result<(), MotorError> {
        let target = Position::try_from(position)?;
        let frame = MessageFrame::outgoing(
            MessageId::MoveTo,
            true,
            self.address,
            MoveTo::percent(target.to_device()).encode(),
        )?;
        let wire = codec::encode_frame(&frame)?;

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            debug!(motor = %self.address, attempt, "sending move to {target}");
            self.transmit(&wire)?;

            let response = self.receive()?;
            match response.frame.kind() {
                Some(MessageId::Ack) => {
                    debug!(motor = %self.address, attempt, "move to {target} acknowledged");
                    return Ok(());
                }
                Some(MessageId::Nack) => {
                    let error_code = nack_error_code(&response.frame.payload);
                    warn!(
                        motor = %self.address,
                        attempt,
                        "received NACK with error code 0x{error_code:02X}"
                    );
                    if attempt >= self.retry.max_attempts {
                        return Err(MotorError::MaxRetriesExceeded {
                            attempts: attempt,
                            error_code,
                        });
                    }
                    self.pacer.clock().sleep(self.retry.nack_backoff);
                }
                _ => return Err(unexpected(&response)),
            }
        }
    }

    /// Queries the motor and returns its position in percent open.
    ///
    /// # Errors
    ///
    /// - [`MotorError::Protocol`] if the reply is not a position report.
    /// - [`MotorError::MalformedFrame`] if the report is short or out of range.
    /// - [`MotorError::Transport`], [`MotorError::Checksum`] from the link and codec.
    pub fn get_position(&mut self) -> Result<i32, MotorError> {
        let frame =
            MessageFrame::outgoing(MessageId::GetMotorPosition, false, self.address, Vec::new())?;
        let wire = codec::encode_frame(&frame)?;

        self.transmit(&wire)?;
        let response = self.receive()?;
        if response.frame.kind() != Some(MessageId::PostMotorPosition) {
            return Err(unexpected(&response));
        }

        let report = MotorPositionReport::decode(&response.frame.payload)?;
        debug!(
            motor = %self.address,
            pulses = report.pulse_position,
            percent_closed = report.percentage_closed,
            "position report"
        );
        let position = Position::from_device(report.percentage_closed)?;
        Ok(i32::from(position))
    }

    /// Consumes the engine and returns the link.
    pub fn into_link(self) -> T {
        self.link
    }

    fn transmit(&mut self, wire: &[u8]) -> Result<(), MotorError> {
        self.pacer.wait_for_slot();
        debug!("tx {}", HexBytes(wire));
        self.link.write_all(wire).map_err(MotorError::Transport)?;
        self.link.flush().map_err(MotorError::Transport)?;
        self.pacer.mark_sent();
        Ok(())
    }

    /// Reads one response.  On failure the rest of the link's input is
    /// dropped, so a half-read frame cannot leak into the next command.
    fn receive(&mut self) -> Result<Response, MotorError> {
        match read_response(&mut self.link) {
            Ok(response) => Ok(response),
            Err(e) => {
                if let Err(discard) = self.link.discard_input() {
                    warn!(motor = %self.address, "failed to discard unread input: {discard}");
                }
                Err(e)
            }
        }
    }
}

fn read_response<T: Transport>(link: &mut T) -> Result<Response, MotorError> {
    let raw = codec::read_frame_bytes(link)?;
    debug!("rx {}", HexBytes(&raw));
    let (frame, _) = codec::decode_frame(&raw)?;
    Ok(Response { frame, raw })
}

fn unexpected(response: &Response) -> MotorError {
    MotorError::Protocol {
        message_id: response.frame.header.message_id,
        raw: HexBytes(&response.raw).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock::MockLink;
    use crate::protocol::messages::{MessageHeader, CONTROLLER_ADDRESS, FRAME_OVERHEAD};
    use crate::protocol::pacing::{ManualClock, MIN_SEND_SPACING};

    fn motor() -> MotorAddress {
        MotorAddress::new([0xAE, 0x85, 0x0C])
    }

    fn reply(message_id: u8, payload: &[u8]) -> Vec<u8> {
        let frame = MessageFrame {
            header: MessageHeader {
                message_id,
                ack_required: false,
                payload_length: (FRAME_OVERHEAD + payload.len()) as u8,
                node_type: 0x70,
                source: motor().wire_bytes(),
                destination: CONTROLLER_ADDRESS,
            },
            payload: payload.to_vec(),
        };
        codec::encode_frame(&frame).unwrap()
    }

    fn engine(link: &MockLink, clock: &ManualClock) -> ProtocolEngine<MockLink, ManualClock> {
        ProtocolEngine::with_clock(link.clone(), motor(), clock.clone())
    }

    // ── set_position ─────────────────────────────────────────────────────────

    #[test]
    fn test_set_position_ack_on_first_attempt() {
        // Arrange
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x7F, &[]));
        let mut engine = engine(&link, &clock);

        // Act
        let result = engine.set_position(5);

        // Assert
        assert!(result.is_ok());
        assert_eq!(link.writes().len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_set_position_out_of_range_writes_nothing() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut engine = engine(&link, &clock);

        for bad in [-1, 101, i32::MIN, i32::MAX] {
            let result = engine.set_position(bad);
            assert!(
                matches!(result, Err(MotorError::Validation { position }) if position == i64::from(bad)),
                "{bad}"
            );
        }
        assert!(link.writes().is_empty());
    }

    #[test]
    fn test_set_position_retries_after_nack_then_succeeds() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x6F, &[0x10]));
        link.push_response(&reply(0x7F, &[]));
        let mut engine = engine(&link, &clock);

        engine.set_position(40).unwrap();

        let frames = link.written_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], frames[1], "retry retransmits the same frame");
        assert_eq!(clock.sleeps(), vec![DEFAULT_NACK_BACKOFF]);
    }

    #[test]
    fn test_set_position_persistent_nack_stops_after_three_sends() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        for _ in 0..3 {
            link.push_response(&reply(0x6F, &[0x21]));
        }
        let mut engine = engine(&link, &clock);

        let result = engine.set_position(5);

        assert!(matches!(
            result,
            Err(MotorError::MaxRetriesExceeded { attempts: 3, error_code: 0x21 })
        ));
        assert_eq!(link.writes().len(), 3);
        assert_eq!(clock.sleeps(), vec![DEFAULT_NACK_BACKOFF, DEFAULT_NACK_BACKOFF]);
    }

    #[test]
    fn test_set_position_nack_without_payload_reports_sentinel_code() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut engine = engine(&link, &clock).with_retry_policy(RetryPolicy {
            max_attempts: 1,
            nack_backoff: Duration::from_secs(1),
        });
        link.push_response(&reply(0x6F, &[]));

        let result = engine.set_position(5);

        assert!(matches!(
            result,
            Err(MotorError::MaxRetriesExceeded { attempts: 1, error_code: 0xFF })
        ));
    }

    #[test]
    fn test_set_position_unexpected_reply_is_protocol_error_without_retry() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x0D, &[0, 0, 0, 0, 0]));
        link.push_response(&reply(0x7F, &[]));
        let mut engine = engine(&link, &clock);

        let result = engine.set_position(5);

        match result {
            Err(MotorError::Protocol { message_id, raw }) => {
                assert_eq!(message_id, 0x0D);
                assert!(raw.starts_with("F2 "), "raw bytes are included: {raw}");
            }
            other => panic!("expected protocol error, got {other:?}"),
        }
        assert_eq!(link.writes().len(), 1);
    }

    #[test]
    fn test_set_position_timeout_is_transport_error() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut engine = engine(&link, &clock);

        let result = engine.set_position(5);

        match result {
            Err(MotorError::Transport(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(link.writes().len(), 1);
    }

    #[test]
    fn test_set_position_corrupted_reply_is_checksum_error() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut bytes = reply(0x7F, &[]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        link.push_response(&bytes);
        let mut engine = engine(&link, &clock);

        assert!(matches!(engine.set_position(5), Err(MotorError::Checksum { .. })));
    }

    #[test]
    fn test_set_position_write_failure_is_transport_error() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.fail_writes();
        let mut engine = engine(&link, &clock);

        assert!(matches!(engine.set_position(5), Err(MotorError::Transport(_))));
    }

    #[test]
    fn test_each_call_starts_a_fresh_attempt_counter() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut engine = engine(&link, &clock);

        link.push_response(&reply(0x6F, &[1]));
        link.push_response(&reply(0x6F, &[1]));
        link.push_response(&reply(0x7F, &[]));
        engine.set_position(10).unwrap();

        link.push_response(&reply(0x6F, &[1]));
        link.push_response(&reply(0x6F, &[1]));
        link.push_response(&reply(0x7F, &[]));
        engine.set_position(20).unwrap();

        assert_eq!(link.writes().len(), 6);
    }

    #[test]
    fn test_bad_length_reply_does_not_poison_next_call() {
        // Arrange: an ACK whose length field was corrupted to 5.
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut corrupt = reply(0x7F, &[]);
        corrupt[1] = !0x05;
        link.push_response(&corrupt);
        let mut engine = engine(&link, &clock);

        // Act
        let first = engine.set_position(30);
        link.push_response(&reply(0x7F, &[]));
        let second = engine.set_position(30);

        // Assert
        assert!(matches!(first, Err(MotorError::MalformedFrame(_))));
        assert!(second.is_ok(), "{second:?}");
        assert_eq!(link.discard_count(), 1);
        assert_eq!(link.pending_response_bytes(), 0);
    }

    #[test]
    fn test_line_noise_after_bad_checksum_is_dropped() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let mut corrupt = reply(0x0D, &[0x64, 0x00, 22, 0xFF, 0x00]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x01;
        link.push_response(&corrupt);
        link.push_response(&[0x00, 0x13, 0x37]);
        let mut engine = engine(&link, &clock);

        let first = engine.get_position();
        link.push_response(&reply(0x0D, &[0x64, 0x00, 22, 0xFF, 0x00]));
        let second = engine.get_position();

        assert!(matches!(first, Err(MotorError::Checksum { .. })));
        assert_eq!(second.unwrap(), 78);
    }

    #[test]
    fn test_successful_reply_leaves_input_alone() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x7F, &[]));
        let mut engine = engine(&link, &clock);

        engine.set_position(10).unwrap();

        assert_eq!(link.discard_count(), 0);
    }

    // ── get_position ─────────────────────────────────────────────────────────

    #[test]
    fn test_get_position_returns_caller_convention() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x0D, &[0x64, 0x00, 22, 0xFF, 0x00]));
        let mut engine = engine(&link, &clock);

        assert_eq!(engine.get_position().unwrap(), 78);
    }

    #[test]
    fn test_get_position_sends_query_without_ack_flag() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x0D, &[0, 0, 0, 0, 0]));
        let mut engine = engine(&link, &clock);

        engine.get_position().unwrap();

        assert_eq!(
            link.written_frames(),
            vec![vec![0xF3, 0xF4, 0xFF, 0x80, 0x80, 0x80, 0xF3, 0x7A, 0x51, 0x06, 0x24]]
        );
    }

    #[test]
    fn test_get_position_wrong_reply_is_protocol_error() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x7F, &[]));
        let mut engine = engine(&link, &clock);

        assert!(matches!(
            engine.get_position(),
            Err(MotorError::Protocol { message_id: 0x7F, .. })
        ));
    }

    #[test]
    fn test_get_position_short_report_is_malformed() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x0D, &[0x64, 0x00]));
        let mut engine = engine(&link, &clock);

        assert!(matches!(engine.get_position(), Err(MotorError::MalformedFrame(_))));
    }

    #[test]
    fn test_get_position_unset_limits_is_malformed() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x0D, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF]));
        let mut engine = engine(&link, &clock);

        assert!(matches!(engine.get_position(), Err(MotorError::MalformedFrame(_))));
    }

    // ── pacing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_back_to_back_calls_are_spaced() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        link.push_response(&reply(0x7F, &[]));
        link.push_response(&reply(0x0D, &[0, 0, 50, 0, 0]));
        let mut engine = engine(&link, &clock);

        engine.set_position(50).unwrap();
        engine.get_position().unwrap();

        let writes = link.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes[1].at - writes[0].at >= MIN_SEND_SPACING);
        assert_eq!(clock.sleeps(), vec![MIN_SEND_SPACING]);
    }

    // ── misc ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_zero_attempt_policy_is_clamped_to_one() {
        let clock = ManualClock::new();
        let link = MockLink::with_clock(clock.clone());
        let engine = engine(&link, &clock).with_retry_policy(RetryPolicy {
            max_attempts: 0,
            nack_backoff: Duration::ZERO,
        });
        assert_eq!(engine.retry_policy().max_attempts, 1);
    }

    #[test]
    fn test_frame_error_mapping_preserves_taxonomy() {
        let io = FrameError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(matches!(MotorError::from(io), MotorError::Transport(_)));

        let sum = FrameError::ChecksumMismatch { received: 1, expected: 2 };
        assert!(matches!(
            MotorError::from(sum),
            MotorError::Checksum { received: 1, expected: 2 }
        ));

        let len = FrameError::InvalidLength(3);
        assert!(matches!(MotorError::from(len), MotorError::MalformedFrame(_)));
    }
}
