use serde::{Deserialize, Serialize};

use crate::{error::StoreError, types::StoreEvent};

/// High-level store lifecycle state.
///
/// The store follows the authenticated session: it becomes `Ready` when the
/// client connects and is reset to `Stopped` when the client disconnects.
/// A stopped store may become ready again on reconnect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreLifecycleState {
    /// Store has been constructed but never readied.
    Cold,
    /// Initial room scan completed; event handlers are active.
    Ready,
    /// Client disconnected; registry and index were reset.
    Stopped,
}

/// Store lifecycle state machine.
#[derive(Debug, Clone)]
pub struct StoreLifecycle {
    state: StoreLifecycleState,
}

impl Default for StoreLifecycle {
    fn default() -> Self {
        Self {
            state: StoreLifecycleState::Cold,
        }
    }
}

impl StoreLifecycle {
    pub fn state(&self) -> StoreLifecycleState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == StoreLifecycleState::Ready
    }

    /// Transition to `Ready` after a successful initialization scan.
    pub fn mark_ready(&mut self) -> Result<StoreEvent, StoreError> {
        self.transition_from_any_of(
            &[StoreLifecycleState::Cold, StoreLifecycleState::Stopped],
            StoreLifecycleState::Ready,
            "on_ready",
        )
    }

    /// Transition to `Stopped` on client disconnect.
    pub fn mark_not_ready(&mut self) -> Result<StoreEvent, StoreError> {
        self.transition_from_any_of(
            &[StoreLifecycleState::Ready],
            StoreLifecycleState::Stopped,
            "on_not_ready",
        )
    }

    fn transition_from_any_of(
        &mut self,
        expected: &[StoreLifecycleState],
        next: StoreLifecycleState,
        action: &str,
    ) -> Result<StoreEvent, StoreError> {
        if !expected.contains(&self.state) {
            return Err(StoreError::invalid_lifecycle(self.state, action));
        }
        self.state = next;
        Ok(StoreEvent::LifecycleChanged { state: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_ready_stop_ready_cycle() {
        let mut lifecycle = StoreLifecycle::default();
        assert_eq!(lifecycle.state(), StoreLifecycleState::Cold);

        lifecycle.mark_ready().expect("cold store should ready");
        assert!(lifecycle.is_ready());

        lifecycle.mark_not_ready().expect("ready store should stop");
        assert_eq!(lifecycle.state(), StoreLifecycleState::Stopped);

        lifecycle.mark_ready().expect("stopped store should re-ready");
        assert!(lifecycle.is_ready());
    }

    #[test]
    fn rejects_double_ready() {
        let mut lifecycle = StoreLifecycle::default();
        lifecycle.mark_ready().expect("first ready should work");

        let err = lifecycle
            .mark_ready()
            .expect_err("second ready should fail");
        assert_eq!(err.code, "invalid_lifecycle_transition");
    }

    #[test]
    fn rejects_stop_before_ready() {
        let mut lifecycle = StoreLifecycle::default();
        let err = lifecycle
            .mark_not_ready()
            .expect_err("cold store cannot stop");
        assert_eq!(err.code, "invalid_lifecycle_transition");
    }
}
