//! In-memory shade backend.
//!
//! Remembers the last position it was given and reports it back.  Useful
//! for running the HTTP service without hardware and as a test double.

use shade_core::Position;

use crate::application::control_shade::{ControlError, ShadeAdapter};

/// A shade that moves instantly and never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryShade {
    position: Position,
}

impl InMemoryShade {
    /// Starts fully closed.
    pub fn new() -> Self {
        Self::with_position(Position::CLOSED)
    }

    pub fn with_position(position: Position) -> Self {
        Self { position }
    }
}

impl Default for InMemoryShade {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadeAdapter for InMemoryShade {
    fn set_position(&mut self, position: i32) -> Result<(), ControlError> {
        self.position = Position::try_from(position)
            .map_err(|_| ControlError::InvalidPosition(i64::from(position)))?;
        Ok(())
    }

    fn get_position(&mut self) -> Result<i32, ControlError> {
        Ok(i32::from(self.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_shade_reports_closed() {
        let mut shade = InMemoryShade::new();
        assert_eq!(shade.get_position().unwrap(), 0);
    }

    #[test]
    fn test_set_then_get_returns_same_position() {
        // Arrange
        let mut shade = InMemoryShade::new();

        // Act
        shade.set_position(63).unwrap();

        // Assert
        assert_eq!(shade.get_position().unwrap(), 63);
    }

    #[test]
    fn test_out_of_range_leaves_position_unchanged() {
        let mut shade = InMemoryShade::with_position(Position::OPEN);

        let result = shade.set_position(-5);

        assert!(matches!(result, Err(ControlError::InvalidPosition(-5))));
        assert_eq!(shade.get_position().unwrap(), 100);
    }
}
