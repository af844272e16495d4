//! Operator-facing request and response shapes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use limiquantix_domain::{
    CpuSpec, DisplaySpec, GuestOsFamily, HaPolicy, MemorySpec, VirtualMachine, VmSpec, VmState,
};

/// Request to create a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVmRequest {
    /// VM name, unique within the project
    pub name: String,
    /// Owning project; empty or "default" selects the system default
    pub project_id: String,
    /// Free-text description
    pub description: String,
    /// Operator labels
    pub labels: HashMap<String, String>,
    /// Desired spec
    pub spec: VmSpec,
    /// Explicit target node; empty lets the scheduler pick
    pub node_id: String,
    /// Start the VM once created
    pub start_on_create: bool,
    /// Acting operator
    pub created_by: String,
}

/// Request to update mutable VM fields. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVmRequest {
    pub vm_id: String,
    pub description: Option<String>,
    pub labels: Option<HashMap<String, String>>,
    /// CPU changes are rejected while the VM runs
    pub cpu: Option<CpuSpec>,
    /// Memory changes are rejected while the VM runs
    pub memory: Option<MemorySpec>,
    pub display: Option<DisplaySpec>,
    pub guest_os: Option<GuestOsFamily>,
    pub ha_policy: Option<HaPolicy>,
}

/// Request to delete a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVmRequest {
    pub vm_id: String,
    /// Delete even while running
    pub force: bool,
    /// Drop only the control-plane record, never touching the node
    pub remove_from_inventory_only: bool,
    /// Ask the node to delete backing volumes too
    pub delete_volumes: bool,
}

/// Request to list VMs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVmsRequest {
    pub project_id: Option<String>,
    pub node_id: Option<String>,
    pub states: Vec<VmState>,
    pub labels: HashMap<String, String>,
    /// 0 selects the default page size
    pub page_size: usize,
    pub page_token: Option<String>,
}

/// A page of VMs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVmsResponse {
    pub vms: Vec<VirtualMachine>,
    /// Total matching records, ignoring pagination
    pub total: usize,
    /// Cursor for the next page; absent on the last page
    pub next_page_token: Option<String>,
}

/// Request to stop a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopVmRequest {
    pub vm_id: String,
    /// Power off instead of gracefully shutting down
    pub force: bool,
}

/// Request to reconcile a stuck lifecycle state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetVmStateRequest {
    pub vm_id: String,
    /// Skip the agent query and pin the record to stopped
    pub force_to_stopped: bool,
}

/// How clone disks relate to the source volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloneType {
    /// Copy-on-write against the source volumes
    Linked,
    /// Independent copies of the source data
    Full,
}

impl Default for CloneType {
    fn default() -> Self {
        Self::Linked
    }
}

impl CloneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloneType::Linked => "LINKED",
            CloneType::Full => "FULL",
        }
    }
}

/// Request to clone a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloneVmRequest {
    pub source_vm_id: String,
    /// Name of the clone
    pub name: String,
    /// Empty inherits the source's project
    pub project_id: String,
    pub clone_type: CloneType,
    pub start_on_create: bool,
}

/// Request to snapshot a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub vm_id: String,
    pub name: String,
    pub description: String,
    /// Capture guest memory alongside the disks
    pub include_memory: bool,
    /// Quiesce guest filesystems through the guest agent
    pub quiesce: bool,
}

/// Request to revert a VM to a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevertSnapshotRequest {
    pub vm_id: String,
    pub snapshot_id: String,
    /// Start the VM once reverted
    pub start_after_revert: bool,
}

/// Request to delete a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSnapshotRequest {
    pub vm_id: String,
    pub snapshot_id: String,
}

/// Request to attach a disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachDiskRequest {
    pub vm_id: String,
    pub size_gib: u64,
    /// Bus string; empty selects virtio
    pub bus: String,
    /// Cache mode; empty selects none
    pub cache: String,
    pub storage_pool_id: Option<String>,
    pub readonly: bool,
}

/// Request to detach a disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetachDiskRequest {
    pub vm_id: String,
    pub disk_name: String,
    /// Required to hot-unplug from a running VM
    pub force: bool,
}

/// Request to grow a disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResizeDiskRequest {
    pub vm_id: String,
    pub disk_name: String,
    pub new_size_gib: u64,
}

/// Request to attach a NIC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachNicRequest {
    pub vm_id: String,
    pub network_id: String,
    /// Generated under the QEMU OUI when absent
    pub mac_address: Option<String>,
    /// NIC model; empty selects virtio
    pub model: String,
    pub security_groups: Vec<String>,
}

/// Request to detach a NIC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetachNicRequest {
    pub vm_id: String,
    pub nic_name: String,
    /// Required to hot-unplug from a running VM
    pub force: bool,
}

/// Request to add a CD-ROM drive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachCdromRequest {
    pub vm_id: String,
    pub iso_path: Option<String>,
}

/// Request to remove a CD-ROM drive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetachCdromRequest {
    pub vm_id: String,
    pub cdrom_name: String,
}

/// Request to mount an ISO into a CD-ROM drive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MountIsoRequest {
    pub vm_id: String,
    pub cdrom_name: String,
    pub iso_path: String,
}

/// Request to eject the media of a CD-ROM drive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EjectIsoRequest {
    pub vm_id: String,
    pub cdrom_name: String,
}

/// Console endpoint handed to operators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleResponse {
    /// Console protocol ("vnc" or "spice")
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// Guest agent liveness as reported to operators. Never a hard failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PingAgentResponse {
    pub connected: bool,
    pub version: String,
    pub uptime_seconds: u64,
    pub error: Option<String>,
}

/// Request to list audit events for a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListEventsRequest {
    pub vm_id: String,
    /// Restrict to one category, by name
    pub event_type: Option<String>,
    /// Restrict to one severity, by name
    pub severity: Option<String>,
    /// 0 selects the repository default
    pub limit: usize,
    pub since: Option<DateTime<Utc>>,
}
