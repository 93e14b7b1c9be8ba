//! # shade-core
//!
//! Protocol engine for motorized window coverings driven over a half-duplex
//! RS-485 serial link.  It contains the frame codec, the position mapping,
//! the inter-send pacing, and the acknowledgment/retry engine.
//!
//! This crate is used by the `shade-server` application.  It has no
//! dependencies on serial-port drivers, HTTP, or configuration files: the
//! link is anything that implements [`link::Transport`].
//!
//! # Architecture overview (for beginners)
//!
//! A request travels through the crate like this:
//!
//! ```text
//! caller ─► ProtocolEngine::set_position / get_position
//!             ├─ domain::position   (caller 0-100 open  ⇄  device 0-100 closed)
//!             ├─ protocol::codec    (invert bytes, append checksum)
//!             ├─ protocol::pacing   (≥100ms between two writes)
//!             └─ link::Transport    (blocking write, read with timeout)
//! ```
//!
//! - **`domain`** – Plain value types: the caller-facing [`Position`] and the
//!   device's [`MotorAddress`].
//!
//! - **`protocol`** – How bytes travel over the wire.  Every header and
//!   payload byte is bitwise inverted before transmission and a 16-bit
//!   checksum of the inverted bytes is appended without inversion.
//!
//! - **`link`** – The byte-stream abstraction the engine talks to, plus a
//!   scripted in-memory double for tests.

pub mod domain;
pub mod link;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `shade_core::ProtocolEngine` instead of `shade_core::protocol::engine::ProtocolEngine`.
pub use domain::address::{AddressParseError, MotorAddress};
pub use domain::position::{Position, PositionError};
pub use link::Transport;
pub use protocol::codec::{decode_frame, decode_from, encode_frame, FrameError};
pub use protocol::engine::{MotorError, ProtocolEngine, RetryPolicy};
pub use protocol::messages::{MessageFrame, MessageHeader, MessageId};
pub use protocol::pacing::{Clock, ManualClock, SystemClock};
