//! Scripted link for unit and integration tests.
//!
//! A [`MockLink`] hands out queued response bytes to readers and records each
//! `write` call together with the instant it happened.  Clones share state,
//! so a test keeps one handle for inspection after moving another into the
//! engine.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::link::Transport;
use crate::protocol::pacing::{Clock, SystemClock};

/// One `write` call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub at: Instant,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct MockLinkState {
    rx: VecDeque<u8>,
    writes: Vec<RecordedWrite>,
    discards: usize,
    fail_writes: bool,
}

/// A mock implementation of [`super::Transport`].
///
/// Reading from an empty queue fails with [`io::ErrorKind::TimedOut`], the
/// same way a serial port with a read timeout does.
#[derive(Clone)]
pub struct MockLink {
    state: Arc<Mutex<MockLinkState>>,
    clock: Arc<dyn Clock>,
}

impl MockLink {
    /// Creates a link that timestamps writes with the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Creates a link that timestamps writes with `clock`.
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockLinkState::default())),
            clock: Arc::new(clock),
        }
    }

    /// Queues bytes to be returned by subsequent reads.
    pub fn push_response(&self, bytes: &[u8]) {
        self.lock().rx.extend(bytes.iter().copied());
    }

    /// Makes every subsequent write fail with [`io::ErrorKind::BrokenPipe`].
    pub fn fail_writes(&self) {
        self.lock().fail_writes = true;
    }

    /// All writes so far, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    /// Bytes of every write so far, in order.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.lock().writes.iter().map(|w| w.bytes.clone()).collect()
    }

    /// Number of queued response bytes not yet read.
    pub fn pending_response_bytes(&self) -> usize {
        self.lock().rx.len()
    }

    /// How many times the engine asked the link to drop unread input.
    pub fn discard_count(&self) -> usize {
        self.lock().discards
    }

    fn lock(&self) -> MutexGuard<'_, MockLinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock();
        if state.rx.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "mock link read timed out"));
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let at = self.clock.now();
        let mut state = self.lock();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock link write failed"));
        }
        state.writes.push(RecordedWrite {
            at,
            bytes: buf.to_vec(),
        });
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockLink {
    fn discard_input(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.rx.clear();
        state.discards += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::pacing::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_read_returns_queued_bytes_in_order() {
        // Arrange
        let mut link = MockLink::new();
        link.push_response(&[1, 2, 3]);
        link.push_response(&[4]);

        // Act
        let mut buf = [0u8; 4];
        link.read_exact(&mut buf).expect("bytes are queued");

        // Assert
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(link.pending_response_bytes(), 0);
    }

    #[test]
    fn test_read_on_empty_queue_times_out() {
        let mut link = MockLink::new();
        let mut buf = [0u8; 1];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_writes_are_recorded_with_clock_timestamps() {
        // Arrange
        let clock = ManualClock::new();
        let mut link = MockLink::with_clock(clock.clone());
        let t0 = clock.now();

        // Act
        link.write_all(&[0xAA]).unwrap();
        clock.advance(Duration::from_millis(150));
        link.write_all(&[0xBB, 0xCC]).unwrap();

        // Assert
        let writes = link.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].at, t0);
        assert_eq!(writes[1].at - writes[0].at, Duration::from_millis(150));
        assert_eq!(link.written_frames(), vec![vec![0xAA], vec![0xBB, 0xCC]]);
    }

    #[test]
    fn test_clones_share_state() {
        let link = MockLink::new();
        let mut moved = link.clone();
        moved.write_all(&[7]).unwrap();
        assert_eq!(link.written_frames(), vec![vec![7]]);
    }

    #[test]
    fn test_discard_input_empties_queue() {
        let mut link = MockLink::new();
        link.push_response(&[1, 2, 3]);

        link.discard_input().unwrap();

        assert_eq!(link.pending_response_bytes(), 0);
        assert_eq!(link.discard_count(), 1);
    }

    #[test]
    fn test_fail_writes_returns_broken_pipe() {
        let mut link = MockLink::new();
        link.fail_writes();
        let err = link.write(&[1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(link.writes().is_empty());
    }
}
