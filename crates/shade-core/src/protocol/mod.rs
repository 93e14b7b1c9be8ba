//! Protocol module containing frame types, the binary codec, send pacing,
//! and the acknowledgment engine.

pub mod codec;
pub mod engine;
pub mod messages;
pub mod pacing;

pub use codec::{decode_frame, decode_from, encode, encode_frame, FrameError};
pub use engine::{MotorError, ProtocolEngine, RetryPolicy};
pub use messages::*;
pub use pacing::{Clock, ManualClock, SendPacer, SystemClock, MIN_SEND_SPACING};
