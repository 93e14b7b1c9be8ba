//! Motor bus address.
//!
//! Motors are addressed by a 3-byte identifier printed on their label.  On
//! the wire the bytes travel in the opposite order, so [`MotorAddress::new`]
//! reverses them exactly once.  Everything downstream (the codec, the
//! engine) works with the wire order returned by [`MotorAddress::wire_bytes`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when parsing a motor address from text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The text did not contain exactly six hex digits.
    #[error("motor address must be 3 bytes (6 hex digits), got {0:?}")]
    WrongLength(String),

    /// A character was not a hex digit.
    #[error("motor address contains a non-hex character: {0:?}")]
    InvalidHex(String),
}

/// The 3-byte address of one motor, stored in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotorAddress {
    wire: [u8; 3],
}

impl MotorAddress {
    /// Creates an address from the bytes as printed on the motor.
    ///
    /// The bytes are reversed into wire order here and never again.
    ///
    /// ```rust
    /// use shade_core::MotorAddress;
    ///
    /// let addr = MotorAddress::new([0xAE, 0x85, 0x0C]);
    /// assert_eq!(addr.wire_bytes(), [0x0C, 0x85, 0xAE]);
    /// ```
    pub fn new(label: [u8; 3]) -> Self {
        Self {
            wire: [label[2], label[1], label[0]],
        }
    }

    /// Creates an address from bytes already in wire order.
    pub fn from_wire(wire: [u8; 3]) -> Self {
        Self { wire }
    }

    /// The address bytes in the order they are transmitted.
    pub fn wire_bytes(&self) -> [u8; 3] {
        self.wire
    }

    /// The address bytes in label order (as they were supplied to [`new`](Self::new)).
    pub fn label_bytes(&self) -> [u8; 3] {
        [self.wire[2], self.wire[1], self.wire[0]]
    }
}

impl FromStr for MotorAddress {
    type Err = AddressParseError;

    /// Parses label-order hex such as `"0c:85:ae"`, `"0C85AE"`, or `"0c 85 ae"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect();
        if digits.len() != 6 {
            return Err(AddressParseError::WrongLength(s.to_string()));
        }

        let mut label = [0u8; 3];
        for (i, byte) in label.iter_mut().enumerate() {
            let pair = digits
                .get(i * 2..i * 2 + 2)
                .ok_or_else(|| AddressParseError::InvalidHex(s.to_string()))?;
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| AddressParseError::InvalidHex(s.to_string()))?;
        }
        Ok(Self::new(label))
    }
}

impl fmt::Display for MotorAddress {
    /// Formats in label order, e.g. `0c:85:ae`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.label_bytes();
        write!(f, "{a:02x}:{b:02x}:{c:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_reverses_label_bytes_into_wire_order() {
        let addr = MotorAddress::new([0xAE, 0x85, 0x0C]);
        assert_eq!(addr.wire_bytes(), [0x0C, 0x85, 0xAE]);
    }

    #[test]
    fn test_label_bytes_round_trips_through_new() {
        let addr = MotorAddress::new([0x01, 0x02, 0x03]);
        assert_eq!(addr.label_bytes(), [0x01, 0x02, 0x03]);
        assert_eq!(MotorAddress::new(addr.label_bytes()), addr);
    }

    #[test]
    fn test_from_wire_does_not_reverse() {
        let addr = MotorAddress::from_wire([0x0C, 0x85, 0xAE]);
        assert_eq!(addr.wire_bytes(), [0x0C, 0x85, 0xAE]);
        assert_eq!(addr, MotorAddress::new([0xAE, 0x85, 0x0C]));
    }

    #[test]
    fn test_parse_accepts_common_separators_and_case() {
        let expected = MotorAddress::new([0x0C, 0x85, 0xAE]);
        for text in ["0c:85:ae", "0C85AE", "0c 85 ae", "0c-85-ae"] {
            assert_eq!(text.parse::<MotorAddress>().unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(matches!(
            "0c:85".parse::<MotorAddress>(),
            Err(AddressParseError::WrongLength(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        assert!(matches!(
            "zz:85:ae".parse::<MotorAddress>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_parse_rejects_multibyte_characters_without_panicking() {
        assert!("0c:85:é".parse::<MotorAddress>().is_err());
    }

    #[test]
    fn test_display_uses_label_order() {
        let addr = MotorAddress::new([0x0C, 0x85, 0xAE]);
        assert_eq!(addr.to_string(), "0c:85:ae");
    }
}
