//! Caller-facing shade position and its mapping to the motor convention.
//!
//! Callers speak "percent open": 0 is fully closed, 100 is fully open.
//! The motor speaks "percent closed": 0 is fully open, 100 is fully closed.
//! The two scales mirror each other:
//!
//! ```text
//! device = 100 - caller
//! caller = 100 - device
//! ```

use std::fmt;

use thiserror::Error;

/// Upper bound of both position scales.
pub const MAX_POSITION: u8 = 100;

/// Error returned when a value does not fit the 0-100 position range.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PositionError {
    /// A caller supplied a position outside 0-100.
    #[error("position {0} is outside the range 0-100")]
    OutOfRange(i64),

    /// The motor reported a percent-closed value outside 0-100.
    #[error("device reported {0}% closed, outside the range 0-100")]
    DeviceOutOfRange(u8),
}

/// A shade position in the caller's convention (higher = more open).
///
/// Construction validates the range, so a `Position` is always 0-100.
///
/// # Examples
///
/// ```rust
/// use shade_core::Position;
///
/// let p = Position::new(5).unwrap();
/// assert_eq!(p.to_device(), 95);
/// assert_eq!(Position::from_device(95).unwrap(), p);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(u8);

impl Position {
    /// Fully closed.
    pub const CLOSED: Position = Position(0);
    /// Fully open.
    pub const OPEN: Position = Position(MAX_POSITION);

    /// Creates a position from a percent-open value.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::OutOfRange`] when `percent_open > 100`.
    pub fn new(percent_open: u8) -> Result<Self, PositionError> {
        if percent_open > MAX_POSITION {
            return Err(PositionError::OutOfRange(i64::from(percent_open)));
        }
        Ok(Self(percent_open))
    }

    /// Maps a motor-reported percent-closed value into the caller convention.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError::DeviceOutOfRange`] when `percent_closed > 100`.
    /// Motors report `0xFF` while their end limits are not yet set.
    pub fn from_device(percent_closed: u8) -> Result<Self, PositionError> {
        if percent_closed > MAX_POSITION {
            return Err(PositionError::DeviceOutOfRange(percent_closed));
        }
        Ok(Self(MAX_POSITION - percent_closed))
    }

    /// Percent open, 0-100.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Percent closed, the value the motor expects in a move command.
    pub fn to_device(self) -> u8 {
        MAX_POSITION - self.0
    }
}

impl TryFrom<i32> for Position {
    type Error = PositionError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| PositionError::OutOfRange(i64::from(value)))
            .and_then(Position::new)
    }
}

impl From<Position> for i32 {
    fn from(position: Position) -> Self {
        i32::from(position.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_valid_position_mirrors_onto_device_scale() {
        for caller in 0..=100u8 {
            let position = Position::new(caller).unwrap();
            assert_eq!(position.to_device(), 100 - caller);
        }
    }

    #[test]
    fn test_from_device_inverts_to_device() {
        for device in 0..=100u8 {
            let position = Position::from_device(device).unwrap();
            assert_eq!(position.to_device(), device);
        }
    }

    #[test]
    fn test_new_rejects_values_above_100() {
        assert_eq!(Position::new(101), Err(PositionError::OutOfRange(101)));
    }

    #[test]
    fn test_try_from_i32_rejects_negative_values() {
        assert_eq!(Position::try_from(-1), Err(PositionError::OutOfRange(-1)));
    }

    #[test]
    fn test_try_from_i32_rejects_values_beyond_u8() {
        assert_eq!(Position::try_from(1000), Err(PositionError::OutOfRange(1000)));
    }

    #[test]
    fn test_try_from_i32_accepts_bounds() {
        assert_eq!(Position::try_from(0), Ok(Position::CLOSED));
        assert_eq!(Position::try_from(100), Ok(Position::OPEN));
    }

    #[test]
    fn test_from_device_rejects_unset_limits_marker() {
        assert_eq!(
            Position::from_device(0xFF),
            Err(PositionError::DeviceOutOfRange(0xFF))
        );
    }

    #[test]
    fn test_display_appends_percent_sign() {
        assert_eq!(Position::new(42).unwrap().to_string(), "42%");
    }
}
