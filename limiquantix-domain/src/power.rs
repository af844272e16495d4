//! Wire power-state representation and its mapping to lifecycle states.

use serde::{Deserialize, Serialize};

use crate::state::VmState;

/// Power state as reported on the operator-facing wire.
///
/// Coarser than [`VmState`]: several lifecycle states collapse into one
/// power state, so the reverse mapping is narrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    Provisioning,
    Stopped,
    Running,
    Paused,
    Suspended,
    Migrating,
    Crashed,
    Unknown,
}

impl From<VmState> for PowerState {
    fn from(state: VmState) -> Self {
        match state {
            VmState::Pending | VmState::Creating | VmState::Starting => PowerState::Provisioning,
            VmState::Stopping | VmState::Stopped | VmState::Deleting => PowerState::Stopped,
            VmState::Running => PowerState::Running,
            VmState::Paused => PowerState::Paused,
            VmState::Suspended => PowerState::Suspended,
            VmState::Migrating => PowerState::Migrating,
            VmState::Error | VmState::Failed => PowerState::Crashed,
        }
    }
}

impl PowerState {
    /// Map a wire power state back into a lifecycle state.
    ///
    /// The wire cannot distinguish the transitional states, so
    /// `PROVISIONING` lands on `Creating` and anything unrecognised on
    /// `Stopped`.
    pub fn to_domain(self) -> VmState {
        match self {
            PowerState::Provisioning => VmState::Creating,
            PowerState::Running => VmState::Running,
            PowerState::Paused => VmState::Paused,
            PowerState::Suspended => VmState::Suspended,
            PowerState::Migrating => VmState::Migrating,
            PowerState::Crashed => VmState::Error,
            PowerState::Stopped | PowerState::Unknown => VmState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Provisioning => "PROVISIONING",
            PowerState::Stopped => "STOPPED",
            PowerState::Running => "RUNNING",
            PowerState::Paused => "PAUSED",
            PowerState::Suspended => "SUSPENDED",
            PowerState::Migrating => "MIGRATING",
            PowerState::Crashed => "CRASHED",
            PowerState::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
