//! Domain value types shared by the protocol engine and its callers.
//!
//! - **`position`** – The caller-facing 0-100 "percent open" value and the
//!   mapping to the motor's own "percent closed" convention.
//! - **`address`** – The 3-byte bus address of one motor.

pub mod address;
pub mod position;

pub use address::{AddressParseError, MotorAddress};
pub use position::{Position, PositionError};
