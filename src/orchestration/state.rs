// ABOUTME: Lifecycle states a controller moves its container through.
// ABOUTME: Maps runtime-reported container states onto the controller's view.

use std::fmt;

use crate::runtime::ContainerState;

/// Where a controller's container is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No configuration composed yet.
    #[default]
    Unconfigured,
    /// Spec ready, no container.
    Configured,
    Created,
    Running,
    Stopped,
    Removed,
}

impl LifecycleState {
    /// Whether a container handle is held in this state.
    pub fn has_container(self) -> bool {
        matches!(
            self,
            LifecycleState::Created | LifecycleState::Running | LifecycleState::Stopped
        )
    }

    /// The controller's view of a state reported by inspect.
    pub fn from_runtime(state: ContainerState) -> Self {
        match state {
            ContainerState::Created => LifecycleState::Created,
            ContainerState::Running | ContainerState::Paused | ContainerState::Restarting => {
                LifecycleState::Running
            }
            ContainerState::Removing | ContainerState::Exited | ContainerState::Dead => {
                LifecycleState::Stopped
            }
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleState::Unconfigured => "unconfigured",
            LifecycleState::Configured => "configured",
            LifecycleState::Created => "created",
            LifecycleState::Running => "running",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Removed => "removed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paused_counts_as_running() {
        assert_eq!(
            LifecycleState::from_runtime(ContainerState::Paused),
            LifecycleState::Running
        );
        assert_eq!(
            LifecycleState::from_runtime(ContainerState::Dead),
            LifecycleState::Stopped
        );
    }

    #[test]
    fn only_live_states_hold_a_container() {
        assert!(!LifecycleState::Configured.has_container());
        assert!(LifecycleState::Stopped.has_container());
        assert!(!LifecycleState::Removed.has_container());
    }
}
