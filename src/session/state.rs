//! Terminal session state machine.

use serde::Serialize;

/// Lifecycle state of an interactive terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// Channel accepted, nothing spawned yet.
    #[default]
    Idle,
    /// Allocating the PTY and starting the shell.
    Spawning,
    /// Both pumps are running.
    Active,
    /// One pump finished; the other is being cancelled.
    Draining,
    /// Process gone, handles released.
    Terminated,
}

impl BridgeState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Idle -> Spawning
    /// - Spawning -> Active
    /// - Spawning -> Terminated (spawn failure)
    /// - Active -> Draining
    /// - Draining -> Terminated
    pub fn can_transition_to(&self, target: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (*self, target),
            (Idle, Spawning)
                | (Spawning, Active)
                | (Spawning, Terminated)
                | (Active, Draining)
                | (Draining, Terminated)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: BridgeState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::RelayError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeState::Terminated)
    }
}
