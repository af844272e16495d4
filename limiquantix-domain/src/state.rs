//! VM lifecycle state machine and transition guards.

use serde::{Deserialize, Serialize};

/// VM lifecycle state.
///
/// The happy paths are `Pending → Creating → Stopped`,
/// `Stopped → Starting → Running`, and `Running → Stopping → Stopped`.
/// `Error` and `Failed` are terminal for the current transition and are
/// recovered through the administrative state reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmState {
    Pending,
    Creating,
    Starting,
    Running,
    Stopping,
    Stopped,
    Paused,
    Suspended,
    Migrating,
    Deleting,
    Error,
    Failed,
}

impl Default for VmState {
    fn default() -> Self {
        Self::Pending
    }
}

impl VmState {
    /// Whether a start request is admissible from this state.
    pub fn can_start(&self) -> bool {
        matches!(
            self,
            VmState::Stopped | VmState::Pending | VmState::Failed | VmState::Error
        )
    }

    /// Whether a stop request is admissible from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, VmState::Running | VmState::Paused)
    }

    /// Whether the VM is live on a hypervisor.
    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running)
    }

    /// Whether the state is an in-flight transition that a crashed or
    /// cancelled request can leave behind.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VmState::Creating | VmState::Starting | VmState::Stopping | VmState::Deleting
        )
    }

    /// Lowercase name used in operator-facing messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            VmState::Pending => "pending",
            VmState::Creating => "creating",
            VmState::Starting => "starting",
            VmState::Running => "running",
            VmState::Stopping => "stopping",
            VmState::Stopped => "stopped",
            VmState::Paused => "paused",
            VmState::Suspended => "suspended",
            VmState::Migrating => "migrating",
            VmState::Deleting => "deleting",
            VmState::Error => "error",
            VmState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
