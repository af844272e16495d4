//! Wire shapes of the node daemon contract.
//!
//! These types mirror what the agent accepts and reports. The control plane
//! treats most of them as opaque pass-through; the few mappings it owns
//! (bus strings, bootable inference, guest OS tags) live in
//! [`crate::convert`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use limiquantix_domain::VmState;

// =============================================================================
// POWER STATE
// =============================================================================

/// Power state as reported by the node daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmPowerState {
    Running,
    Stopped,
    Paused,
    Suspended,
    Crashed,
    Unknown,
}

impl Default for VmPowerState {
    fn default() -> Self {
        Self::Unknown
    }
}

impl VmPowerState {
    /// Fold the hypervisor's power state into a lifecycle state.
    ///
    /// Crashed domains surface as `Error`; anything the agent cannot name
    /// is treated as stopped.
    pub fn to_domain_state(self) -> VmState {
        match self {
            VmPowerState::Running => VmState::Running,
            VmPowerState::Stopped => VmState::Stopped,
            VmPowerState::Paused => VmState::Paused,
            VmPowerState::Suspended => VmState::Suspended,
            VmPowerState::Crashed => VmState::Error,
            VmPowerState::Unknown => VmState::Stopped,
        }
    }
}

// =============================================================================
// VM DEFINITION (control plane -> agent)
// =============================================================================

/// Complete VM definition sent to the agent on create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmDefinition {
    /// Control-plane VM id; doubles as the hypervisor domain name
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// CPU topology
    pub cpu: AgentCpu,
    /// Memory sizing
    pub memory: AgentMemory,
    /// Disk devices
    pub disks: Vec<AgentDisk>,
    /// Network interfaces
    pub nics: Vec<AgentNic>,
    /// CD-ROM devices
    pub cdroms: Vec<AgentCdrom>,
    /// Graphical console
    pub display: Option<AgentDisplay>,
    /// Guest OS tag; empty selects the agent default profile
    pub guest_os: String,
    /// Cloud-init payloads
    pub cloud_init: Option<AgentCloudInit>,
    /// Boot order device names
    pub boot_order: Vec<String>,
}

/// CPU topology on the agent wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCpu {
    pub cores: u32,
    pub sockets: u32,
    pub threads_per_core: u32,
    /// Forwarded verbatim from the VM spec's CPU model string
    pub cpu_mode: String,
}

/// Memory sizing on the agent wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    pub size_mib: u64,
    pub balloon_limit_mib: u64,
    pub hugepages: bool,
}

/// Disk bus as the agent enumerates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiskBus {
    VirtioBlk,
    VirtioScsi,
    Nvme,
    Sata,
    Ide,
}

impl Default for DiskBus {
    fn default() -> Self {
        Self::VirtioBlk
    }
}

impl DiskBus {
    /// Parse an operator-supplied bus string. Unknown strings fall back to
    /// virtio-blk.
    pub fn from_wire(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "virtio" | "virtio_blk" => DiskBus::VirtioBlk,
            "scsi" | "virtio_scsi" => DiskBus::VirtioScsi,
            "nvme" => DiskBus::Nvme,
            "sata" => DiskBus::Sata,
            "ide" => DiskBus::Ide,
            _ => DiskBus::VirtioBlk,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiskBus::VirtioBlk => "VIRTIO_BLK",
            DiskBus::VirtioScsi => "VIRTIO_SCSI",
            DiskBus::Nvme => "NVME",
            DiskBus::Sata => "SATA",
            DiskBus::Ide => "IDE",
        }
    }
}

/// Disk image format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskFormat {
    Qcow2,
    Raw,
}

impl Default for DiskFormat {
    fn default() -> Self {
        Self::Qcow2
    }
}

impl DiskFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskFormat::Qcow2 => "qcow2",
            DiskFormat::Raw => "raw",
        }
    }
}

/// Disk device on the agent wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDisk {
    /// Device name within the VM
    pub name: String,
    /// Backing volume; empty when the agent materialises one
    pub volume_id: String,
    pub size_gib: u64,
    pub bus: DiskBus,
    pub format: DiskFormat,
    pub cache: String,
    pub bootable: bool,
    pub readonly: bool,
    pub backing_file: Option<String>,
    pub storage_pool_id: Option<String>,
}

impl Default for AgentDisk {
    fn default() -> Self {
        Self {
            name: String::new(),
            volume_id: String::new(),
            size_gib: 20,
            bus: DiskBus::default(),
            format: DiskFormat::default(),
            cache: "none".to_string(),
            bootable: false,
            readonly: false,
            backing_file: None,
            storage_pool_id: None,
        }
    }
}

/// Network interface on the agent wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentNic {
    pub name: String,
    pub network_id: String,
    /// Empty string lets the hypervisor assign one
    pub mac_address: String,
    pub model: String,
    pub security_groups: Vec<String>,
}

/// CD-ROM device on the agent wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCdrom {
    pub name: String,
    pub iso_path: String,
    pub connected: bool,
}

/// Graphical console on the agent wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentDisplay {
    pub display_type: String,
    pub port: u32,
    pub password: String,
}

/// Cloud-init payloads on the agent wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentCloudInit {
    pub user_data: String,
    pub meta_data: String,
    pub network_config: String,
    pub vendor_data: String,
}

// =============================================================================
// VM STATUS (agent -> control plane)
// =============================================================================

/// Live VM status as reported by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentVmStatus {
    pub vm_id: String,
    pub state: VmPowerState,
    pub resources: AgentResourceUsage,
    pub guest_agent: Option<AgentGuestInfo>,
    /// Addresses the hypervisor knows (DHCP leases, port bindings)
    pub ip_addresses: Vec<String>,
}

/// Resource usage counters from the hypervisor.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentResourceUsage {
    pub cpu_percent: f64,
    pub memory_used_bytes: u64,
    pub disk_read_bps: u64,
    pub disk_write_bps: u64,
    pub net_rx_bps: u64,
    pub net_tx_bps: u64,
}

/// Guest agent report relayed by the node daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentGuestInfo {
    pub connected: bool,
    pub version: String,
    pub hostname: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel: String,
    pub ip_addresses: Vec<String>,
    pub resources: GuestResourceUsage,
}

/// Usage as measured inside the guest.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GuestResourceUsage {
    pub cpu_percent: f64,
    pub memory_used_bytes: u64,
    pub uptime_sec: u64,
}

/// Console endpoint as reported by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleEndpoint {
    pub console_type: String,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// A snapshot in the hypervisor's tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub vm_state: VmPowerState,
    pub memory_included: bool,
    pub quiesced: bool,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Guest agent liveness summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentHealth {
    pub connected: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_folding() {
        assert_eq!(VmPowerState::Running.to_domain_state(), VmState::Running);
        assert_eq!(VmPowerState::Stopped.to_domain_state(), VmState::Stopped);
        assert_eq!(VmPowerState::Paused.to_domain_state(), VmState::Paused);
        assert_eq!(
            VmPowerState::Suspended.to_domain_state(),
            VmState::Suspended
        );
        assert_eq!(VmPowerState::Crashed.to_domain_state(), VmState::Error);
        assert_eq!(VmPowerState::Unknown.to_domain_state(), VmState::Stopped);
    }

    #[test]
    fn test_bus_parsing_table() {
        assert_eq!(DiskBus::from_wire("virtio"), DiskBus::VirtioBlk);
        assert_eq!(DiskBus::from_wire("virtio_blk"), DiskBus::VirtioBlk);
        assert_eq!(DiskBus::from_wire("scsi"), DiskBus::VirtioScsi);
        assert_eq!(DiskBus::from_wire("virtio_scsi"), DiskBus::VirtioScsi);
        assert_eq!(DiskBus::from_wire("nvme"), DiskBus::Nvme);
        assert_eq!(DiskBus::from_wire("sata"), DiskBus::Sata);
        assert_eq!(DiskBus::from_wire("ide"), DiskBus::Ide);
        assert_eq!(DiskBus::from_wire("floppy"), DiskBus::VirtioBlk);
    }
}
