use std::fmt;

/// Lifecycle of one managed process.
///
/// `Operational` is only ever entered through an explicit ready report on the
/// health channel, never inferred from the OS process being alive. A child
/// that is running but still initializing (e.g. building its index) stays
/// `Starting` and blocks its dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Declared but not yet started; waiting on dependencies.
    Pending,
    /// Spawned, startup timer running, ready report not yet seen.
    Starting,
    /// Reported ready on the health channel; heartbeat supervised.
    Operational,
    /// Stop requested, shutdown timer running.
    Stopping,
    /// Exited after a stop request.
    Stopped,
    /// Exited unexpectedly, missed a deadline, or stalled its heartbeat.
    Failed,
    /// Waiting to start again; subject to the same dependency ordering as Pending.
    Restarting,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    pub(crate) fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Pending, Starting)
                | (Pending, Stopped)
                | (Pending, Failed)
                | (Restarting, Starting)
                | (Restarting, Stopped)
                | (Restarting, Failed)
                | (Starting, Operational)
                | (Starting, Failed)
                | (Operational, Stopping)
                | (Operational, Failed)
                | (Stopping, Stopped)
                | (Stopping, Failed)
                | (Failed, Restarting)
                | (Stopped, Restarting)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Pending => write!(f, "pending"),
            LifecycleState::Starting => write!(f, "starting"),
            LifecycleState::Operational => write!(f, "operational"),
            LifecycleState::Stopping => write!(f, "stopping"),
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Failed => write!(f, "failed"),
            LifecycleState::Restarting => write!(f, "restarting"),
        }
    }
}
