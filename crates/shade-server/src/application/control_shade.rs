//! ControlShade use case: the two operations every shade backend offers, and
//! the service that funnels concurrent requests onto one backend.
//!
//! # Architecture
//!
//! ```text
//! HTTP handler ─► ShadeService ─► spawn_blocking ─► Mutex ─► dyn ShadeAdapter
//!                                                            ├─ ProtocolEngine (serial)
//!                                                            └─ InMemoryShade
//! ```
//!
//! The motor link is a single half-duplex bus, so the service holds one
//! exclusive lock for the entire call, retries and backoffs included.  The
//! call itself blocks on serial I/O, so it runs on Tokio's blocking pool
//! instead of an async worker thread.

use std::sync::{Arc, Mutex};

use shade_core::MotorError;
use thiserror::Error;
use tracing::debug;

/// Error type for the control-shade use case.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The requested position is outside 0-100.
    #[error("position {0} is outside the range 0-100")]
    InvalidPosition(i64),

    /// The motor or its link failed.
    #[error("motor error: {0}")]
    Motor(MotorError),

    /// The backend could not be reached at all (poisoned lock, worker panic).
    #[error("shade controller unavailable: {0}")]
    Unavailable(String),
}

impl From<MotorError> for ControlError {
    fn from(e: MotorError) -> Self {
        match e {
            MotorError::Validation { position } => ControlError::InvalidPosition(position),
            other => ControlError::Motor(other),
        }
    }
}

/// A backend that can move a shade and report where it is.
///
/// Positions use the caller convention: 0 is fully closed, 100 fully open.
#[cfg_attr(test, mockall::automock)]
pub trait ShadeAdapter: Send {
    /// Moves the shade to `position` percent open.
    fn set_position(&mut self, position: i32) -> Result<(), ControlError>;

    /// Returns the current position in percent open.
    fn get_position(&mut self) -> Result<i32, ControlError>;
}

/// Shared handle to one shade backend.
///
/// Cheap to clone; every clone talks to the same backend and the same lock.
#[derive(Clone)]
pub struct ShadeService {
    adapter: Arc<Mutex<Box<dyn ShadeAdapter>>>,
}

impl ShadeService {
    pub fn new(adapter: impl ShadeAdapter + 'static) -> Self {
        Self {
            adapter: Arc::new(Mutex::new(Box::new(adapter))),
        }
    }

    /// Moves the shade to `position` percent open.
    ///
    /// # Errors
    ///
    /// Whatever the backend returns, or [`ControlError::Unavailable`] if the
    /// backend lock is poisoned or the worker thread fails.
    pub async fn set_position(&self, position: i32) -> Result<(), ControlError> {
        debug!(position, "set_position requested");
        self.run(move |adapter| adapter.set_position(position)).await
    }

    /// Returns the current position in percent open.
    ///
    /// # Errors
    ///
    /// Same as [`set_position`](Self::set_position).
    pub async fn get_position(&self) -> Result<i32, ControlError> {
        self.run(|adapter| adapter.get_position()).await
    }

    async fn run<R, F>(&self, op: F) -> Result<R, ControlError>
    where
        R: Send + 'static,
        F: FnOnce(&mut dyn ShadeAdapter) -> Result<R, ControlError> + Send + 'static,
    {
        let adapter = Arc::clone(&self.adapter);
        tokio::task::spawn_blocking(move || {
            let mut guard = adapter
                .lock()
                .map_err(|_| ControlError::Unavailable("shade backend lock poisoned".to_string()))?;
            op(guard.as_mut())
        })
        .await
        .map_err(|e| ControlError::Unavailable(format!("shade worker failed: {e}")))?
    }
}
