//! Stream lifecycle state.
//!
//! ```text
//! Idle -> Configured -> Running -> Draining -> Idle
//! ```
//!
//! While a run is `Running` or `Draining` the device belongs to the
//! acquisition engine and every other device-state-changing call is rejected
//! with [`RsaError::DeviceBusy`].

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rsa_core::{Result, RsaError};

/// Where the client is in the acquisition lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Nothing applied since the last run
    #[default]
    Idle,
    /// Configuration applied, sticky status cleared, device prepared
    Configured,
    /// Device running and streaming started
    Running,
    /// Blocks being pulled into the output buffer
    Draining,
}

impl StreamState {
    /// State name for messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Configured => "Configured",
            Self::Running => "Running",
            Self::Draining => "Draining",
        }
    }

    /// True while a run owns the device.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Draining)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared, synchronously readable lifecycle state.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateCell {
    inner: Arc<Mutex<StreamState>>,
}

impl StateCell {
    pub(crate) fn get(&self) -> StreamState {
        *self.inner.lock()
    }

    pub(crate) fn set(&self, next: StreamState) {
        let mut state = self.inner.lock();
        if *state != next {
            tracing::debug!(from = %*state, to = %next, "Stream state transition");
            *state = next;
        }
    }

    /// Fail with `DeviceBusy` if a run owns the device.
    pub(crate) fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        let state = self.get();
        if state.is_active() {
            return Err(RsaError::DeviceBusy {
                operation,
                state: state.name(),
            });
        }
        Ok(())
    }

    /// Track a run; the state returns to `Idle` when the guard drops.
    pub(crate) fn run_guard(&self) -> RunGuard {
        RunGuard { cell: self.clone() }
    }
}

/// Returns the lifecycle to `Idle` on every exit path of a run.
#[derive(Debug)]
pub(crate) struct RunGuard {
    cell: StateCell,
}

impl RunGuard {
    pub(crate) fn advance(&self, next: StreamState) {
        self.cell.set(next);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.cell.set(StreamState::Idle);
    }
}
