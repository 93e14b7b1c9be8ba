//! Minimum spacing between transmissions on the shared bus.
//!
//! # Why pace sends? (for beginners)
//!
//! RS-485 is half-duplex: only one node may drive the line at a time.  The
//! motor needs a quiet gap after each frame before it can accept the next
//! one, so two consecutive writes must be at least [`MIN_SEND_SPACING`]
//! apart.  [`SendPacer`] remembers when the last write finished and blocks
//! for the remainder of the gap if the next write comes too early.
//!
//! # Clocks
//!
//! Time is read and spent through the [`Clock`] trait.  Production code uses
//! [`SystemClock`]; tests use [`ManualClock`], whose `sleep` advances a
//! virtual timeline instantly and records every requested pause.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Required quiet time between two writes to the link.
pub const MIN_SEND_SPACING: Duration = Duration::from_millis(100);

/// Source of time for pacing and retry backoff.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Instant;
    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and real thread sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug)]
struct ManualClockState {
    now: Instant,
    sleeps: Vec<Duration>,
}

/// A virtual clock for tests.
///
/// `sleep` returns immediately after moving the clock forward.  Clones share
/// the same timeline, so a test can hand one clone to the engine and another
/// to a mock link and see consistent timestamps in both.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualClockState>>,
}

impl ManualClock {
    /// Creates a clock starting at the current real instant.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualClockState {
                now: Instant::now(),
                sleeps: Vec::new(),
            })),
        }
    }

    /// Moves the clock forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.lock().now += duration;
    }

    /// Every duration passed to [`Clock::sleep`], in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockState> {
        // A panicking test thread must not hide the timeline from the others.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock().now
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.now += duration;
        state.sleeps.push(duration);
    }
}

/// Enforces [`MIN_SEND_SPACING`] between consecutive writes.
///
/// Lives as long as the engine that owns it, so the spacing holds across
/// separate commands, not just within one.
#[derive(Debug)]
pub struct SendPacer<C> {
    clock: C,
    spacing: Duration,
    last_send_at: Option<Instant>,
}

impl<C: Clock> SendPacer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            spacing: MIN_SEND_SPACING,
            last_send_at: None,
        }
    }

    /// Blocks until a write is allowed.  Returns how long it waited.
    pub fn wait_for_slot(&mut self) -> Duration {
        let Some(last) = self.last_send_at else {
            return Duration::ZERO;
        };
        let elapsed = self.clock.now().saturating_duration_since(last);
        if elapsed >= self.spacing {
            return Duration::ZERO;
        }
        let remaining = self.spacing - elapsed;
        debug!("only {elapsed:?} since last send, waiting {remaining:?}");
        self.clock.sleep(remaining);
        remaining
    }

    /// Records that a write has just completed.
    pub fn mark_sent(&mut self) {
        self.last_send_at = Some(self.clock.now());
    }

    /// When the last write completed, if any.
    pub fn last_send_at(&self) -> Option<Instant> {
        self.last_send_at
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
