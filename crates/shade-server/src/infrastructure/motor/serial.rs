//! Serial-port link to the RS-485 bus.
//!
//! The motor bus runs at 4800 baud, 8 data bits, odd parity, 1 stop bit.
//! Reads give up after the configured timeout, which the engine surfaces as
//! a transport error when a motor never answers.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use shade_core::Transport;
use thiserror::Error;
use tracing::info;

/// Error returned when the serial link cannot be set up.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },
}

/// Parameters for opening the bus adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

/// An open bus adapter.  Unread input is dropped with the driver's
/// receive-buffer flush.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialLink {
    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Opens the serial device with the bus line settings.
///
/// # Errors
///
/// Returns [`LinkError::Open`] if the device does not exist, is busy, or
/// rejects the line settings.
pub fn open_serial_link(settings: &SerialSettings) -> Result<SerialLink, LinkError> {
    let port = serialport::new(settings.path.as_str(), settings.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::Odd)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(settings.read_timeout)
        .open()
        .map_err(|source| LinkError::Open {
            path: settings.path.clone(),
            source,
        })?;

    info!(
        path = %settings.path,
        baud = settings.baud_rate,
        "serial link open (8O1, read timeout {:?})",
        settings.read_timeout
    );
    Ok(SerialLink { port })
}
