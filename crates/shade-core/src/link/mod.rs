//! Byte-stream link between the controller and the motor bus.
//!
//! The engine only needs blocking writes and reads that give up after a
//! bounded timeout, plus a way to throw away unread input after a bad
//! response.  A serial port handle, a TCP stream to an RS-485 gateway, and
//! the scripted [`mock::MockLink`] all fit.
//!
//! # Testability
//!
//! [`mock::MockLink`] replays canned response bytes and timestamps every
//! write, so engine tests can assert exactly what was sent and when.

use std::io::{self, Read, Write};

pub mod mock;

/// A duplex byte stream the protocol engine exclusively owns.
///
/// Reads are expected to fail with [`std::io::ErrorKind::TimedOut`] (or end
/// with EOF) when no data arrives within the link's read timeout.
pub trait Transport: Read + Write + Send {
    /// Drops any received bytes that have not been read yet.
    ///
    /// The engine calls this after a failed read so the next command starts
    /// on a frame boundary.  Links without an input buffer keep the default.
    fn discard_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}
