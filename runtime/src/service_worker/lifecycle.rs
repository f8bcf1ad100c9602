//! Service Worker Lifecycle Management
//!
//! Explicit state machine for a worker's lifecycle. Each platform lifecycle
//! step is one typed transition; anything else is rejected.

use super::{ServiceWorkerError, ServiceWorkerState};

/// A single applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Old state
    pub from: ServiceWorkerState,
    /// New state
    pub to: ServiceWorkerState,
}

/// Lifecycle of one worker instance.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: ServiceWorkerState,
    skip_waiting: bool,
}

impl Lifecycle {
    /// Create a lifecycle in the `Parsed` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> ServiceWorkerState {
        self.state
    }

    /// Whether `skip_waiting` has been requested
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// `parsed → installing`
    pub fn begin_install(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Installing)
    }

    /// `installing → installed`
    pub fn finish_install(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Installed)
    }

    /// `installed → activating`
    pub fn begin_activate(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Activating)
    }

    /// `activating → activated`
    pub fn finish_activate(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Activated)
    }

    /// Any live state → `redundant` (failed or replaced).
    pub fn make_redundant(&mut self) -> Result<StateChange, ServiceWorkerError> {
        self.transition(ServiceWorkerState::Redundant)
    }

    /// Ask to activate without waiting for controlled pages to close.
    ///
    /// Returns `true` when the worker is waiting and may activate right away.
    /// Requests made before install finishes are remembered.
    pub fn skip_waiting(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.skip_waiting = true;
        self.state == ServiceWorkerState::Installed
    }

    fn transition(&mut self, to: ServiceWorkerState) -> Result<StateChange, ServiceWorkerError> {
        let from = self.state;
        if !is_valid_transition(from, to) {
            return Err(ServiceWorkerError::InvalidStateTransition { from, to });
        }
        self.state = to;
        Ok(StateChange { from, to })
    }
}

/// Check if a state transition is valid
fn is_valid_transition(from: ServiceWorkerState, to: ServiceWorkerState) -> bool {
    use ServiceWorkerState::*;

    matches!(
        (from, to),
        // Normal lifecycle
        (Parsed, Installing) |
        (Installing, Installed) |
        (Installed, Activating) |
        (Activating, Activated) |
        // Install/activate failed, replaced while waiting, or superseded
        (Installing, Redundant) |
        (Installed, Redundant) |
        (Activating, Redundant) |
        (Activated, Redundant)
    )
}
