//! Cluster lifecycle states.

use serde::Serialize;
use std::fmt;

use crate::error::{OrchestratorError, Result};

/// Lifecycle state of one cluster, as seen by a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleState {
    /// No workload exists.
    Unprovisioned,

    /// The workload is being created or scaled up.
    Provisioning,

    /// Waiting for every replica to report ready.
    AwaitingReady,

    /// Member data directories are being initialized and configured.
    Initializing,

    /// Members are being started in ascending order.
    StartingMembers,

    /// Every member is started.
    Running,

    /// Members are being stopped in descending order.
    StoppingMembers,

    /// Every member is stopped and the workload scaled to zero.
    Stopped,

    /// A step failed. Absorbing.
    Failed,

    /// The workload is gone. Absorbing.
    Deleted,
}

impl LifecycleState {
    /// Returns the name of this state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unprovisioned => "unprovisioned",
            Self::Provisioning => "provisioning",
            Self::AwaitingReady => "awaiting-ready",
            Self::Initializing => "initializing",
            Self::StartingMembers => "starting-members",
            Self::Running => "running",
            Self::StoppingMembers => "stopping-members",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// Returns true for the absorbing states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Deleted)
    }

    /// Returns true if the lifecycle may move from `self` to `next`.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Failed | Deleted) {
            return true;
        }
        matches!(
            (self, next),
            (Unprovisioned, Provisioning)
                | (Stopped, Provisioning)
                | (Provisioning, AwaitingReady)
                | (AwaitingReady, Initializing)
                | (AwaitingReady, StartingMembers)
                | (Initializing, StartingMembers)
                | (StartingMembers, Running)
                | (Running, StoppingMembers)
                | (StoppingMembers, Stopped)
        )
    }

    /// Moves to `next`, failing with `InvalidStateTransition` if not allowed.
    pub fn transition(self, next: LifecycleState) -> Result<LifecycleState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(OrchestratorError::invalid_state_transition(self.name(), next.name()))
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
