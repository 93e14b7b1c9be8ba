//! Motor backend: the RS-485 protocol engine behind the [`ShadeAdapter`] port.
//!
//! - **`serial`** – Opens the serial device the engine talks through.

pub mod serial;

use shade_core::{Clock, ProtocolEngine, Transport};

use crate::application::control_shade::{ControlError, ShadeAdapter};

impl<T, C> ShadeAdapter for ProtocolEngine<T, C>
where
    T: Transport,
    C: Clock,
{
    fn set_position(&mut self, position: i32) -> Result<(), ControlError> {
        ProtocolEngine::set_position(self, position).map_err(ControlError::from)
    }

    fn get_position(&mut self) -> Result<i32, ControlError> {
        ProtocolEngine::get_position(self).map_err(ControlError::from)
    }
}
