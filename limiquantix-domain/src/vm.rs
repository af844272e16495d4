//! The VirtualMachine aggregate: desired spec and observed status.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::guest_os::GuestOsFamily;
use crate::state::VmState;
use crate::{HARDWARE_VERSION, QEMU_MAC_OUI};

// =============================================================================
// AGGREGATE ROOT
// =============================================================================

/// A control-plane-managed virtual machine record.
///
/// The control plane exclusively owns this record; the node daemon owns the
/// live hypervisor domain it references through `status.node_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Globally unique identifier (UUID v4)
    pub id: String,
    /// Human-readable name, unique within the owning project
    pub name: String,
    /// Owning project identifier
    pub project_id: String,
    /// Free-text description
    pub description: String,
    /// Operator labels
    pub labels: HashMap<String, String>,
    /// Hardware compatibility tag
    pub hardware_version: String,
    /// Identifier of the creating operator
    pub created_by: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
    /// Desired state
    pub spec: VmSpec,
    /// Observed state
    pub status: VmStatus,
}

impl VirtualMachine {
    /// Create a new record with a fresh id and default spec/status.
    pub fn new(name: impl Into<String>, project_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            project_id: project_id.into(),
            description: String::new(),
            labels: HashMap::new(),
            hardware_version: HARDWARE_VERSION.to_string(),
            created_by: String::new(),
            created_at: now,
            updated_at: now,
            spec: VmSpec::default(),
            status: VmStatus::default(),
        }
    }

    /// Set the desired spec.
    pub fn with_spec(mut self, spec: VmSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the label set.
    pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
        self.labels = labels;
        self
    }

    /// The node this VM is assigned to, if any.
    pub fn node_id(&self) -> Option<&str> {
        if self.status.node_id.is_empty() {
            None
        } else {
            Some(&self.status.node_id)
        }
    }
}

// =============================================================================
// DESIRED STATE
// =============================================================================

/// Desired state of a VM as written by operators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmSpec {
    /// CPU topology
    pub cpu: CpuSpec,
    /// Memory sizing
    pub memory: MemorySpec,
    /// Disk devices; the first disk is the boot disk and may not be detached
    pub disks: Vec<DiskSpec>,
    /// Network interfaces; the first NIC is the primary and may not be detached
    pub nics: Vec<NicSpec>,
    /// CD-ROM devices
    pub cdroms: Vec<CdromSpec>,
    /// Graphical console
    pub display: Option<DisplaySpec>,
    /// Guest OS family hint forwarded to the node daemon
    pub guest_os: Option<GuestOsFamily>,
    /// Cloud-init provisioning payloads
    pub provisioning: Option<ProvisioningSpec>,
    /// High-availability policy
    pub ha_policy: Option<HaPolicy>,
    /// Boot order hints
    pub boot: BootSpec,
}

/// CPU topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuSpec {
    /// Number of CPU cores
    pub cores: u32,
    /// Number of CPU sockets
    pub sockets: u32,
    /// Threads per core
    pub threads_per_core: u32,
    /// CPU model (e.g., "host-model", "host-passthrough")
    pub model: Option<String>,
}

impl Default for CpuSpec {
    fn default() -> Self {
        Self {
            cores: 1,
            sockets: 1,
            threads_per_core: 1,
            model: None,
        }
    }
}

impl CpuSpec {
    /// Get total vCPUs.
    pub fn total_vcpus(&self) -> u32 {
        self.cores * self.sockets * self.threads_per_core
    }
}

/// Memory sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySpec {
    /// Memory size in MiB
    pub size_mib: u64,
    /// Balloon ceiling in MiB, when ballooning is constrained
    pub balloon_limit_mib: Option<u64>,
    /// Back memory with huge pages
    pub hugepages_enabled: bool,
}

impl Default for MemorySpec {
    fn default() -> Self {
        Self {
            size_mib: 2048,
            balloon_limit_mib: None,
            hugepages_enabled: false,
        }
    }
}

/// A disk device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskSpec {
    /// Device name within the VM (e.g., "disk-0")
    pub name: String,
    /// Backing volume identifier; empty until the node daemon materialises it
    pub volume_id: String,
    /// Disk size in GiB
    pub size_gib: u64,
    /// Bus string as accepted on the wire ("virtio", "scsi", "nvme", ...)
    pub bus: String,
    /// Caching mode string ("none", "writeback", ...)
    pub cache: String,
    /// Position in the boot order; > 0 marks the disk bootable
    pub boot_order: u32,
    /// Copy-on-write backing volume (linked clones)
    pub backing_file: Option<String>,
    /// Storage pool the volume lives in
    pub storage_pool_id: Option<String>,
    /// Read-only flag
    pub readonly: bool,
}

impl Default for DiskSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            volume_id: String::new(),
            size_gib: 20,
            bus: "virtio".to_string(),
            cache: "none".to_string(),
            boot_order: 0,
            backing_file: None,
            storage_pool_id: None,
            readonly: false,
        }
    }
}

/// A network interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicSpec {
    /// Device name within the VM (e.g., "nic-0")
    pub name: String,
    /// Logical network to attach to
    pub network_id: String,
    /// MAC address; generated under the QEMU OUI when absent
    pub mac_address: Option<String>,
    /// NIC model string ("virtio", "e1000", ...)
    pub model: String,
    /// Security groups applied to the port
    pub security_groups: Vec<String>,
}

impl Default for NicSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            network_id: String::new(),
            mac_address: None,
            model: "virtio".to_string(),
            security_groups: Vec::new(),
        }
    }
}

/// A CD-ROM device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CdromSpec {
    /// Device name within the VM (e.g., "cdrom-0")
    pub name: String,
    /// Mounted ISO path; empty drive when absent
    pub iso_path: Option<String>,
    /// Whether the virtual drive is connected
    pub connected: bool,
}

/// Graphical console configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySpec {
    /// Console protocol
    pub display_type: DisplayType,
    /// Fixed port, when not auto-assigned
    pub port: Option<u16>,
    /// Console password
    pub password: Option<String>,
}

impl Default for DisplaySpec {
    fn default() -> Self {
        Self {
            display_type: DisplayType::Vnc,
            port: None,
            password: None,
        }
    }
}

/// Console protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Vnc,
    Spice,
    None,
}

impl DisplayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayType::Vnc => "vnc",
            DisplayType::Spice => "spice",
            DisplayType::None => "none",
        }
    }
}

/// Cloud-init provisioning payloads attached at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    pub user_data: String,
    pub meta_data: String,
    pub network_config: String,
    pub vendor_data: String,
}

/// High-availability policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaPolicy {
    /// Restart the VM automatically when its node fails
    pub auto_restart: bool,
    /// Restart priority relative to other VMs
    pub priority: u32,
    /// Delay before the restart attempt
    pub restart_delay_sec: u32,
}

/// Boot order hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootSpec {
    /// Boot order
    pub order: Vec<BootDevice>,
}

impl Default for BootSpec {
    fn default() -> Self {
        Self {
            order: vec![BootDevice::Disk, BootDevice::Cdrom, BootDevice::Network],
        }
    }
}

/// Boot device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootDevice {
    Disk,
    Cdrom,
    Network,
}

impl BootDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootDevice::Disk => "hd",
            BootDevice::Cdrom => "cdrom",
            BootDevice::Network => "network",
        }
    }
}

// =============================================================================
// OBSERVED STATE
// =============================================================================

/// Observed state of a VM.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmStatus {
    /// Lifecycle state
    pub state: VmState,
    /// Operator-facing diagnostic for the last transition
    pub message: String,
    /// Assigned hypervisor node; empty when unassigned
    pub node_id: String,
    /// Known guest IP addresses
    pub ip_addresses: Vec<String>,
    /// Live resource usage, refreshed at read time
    pub resources: ResourceUsage,
    /// Guest agent report, when the agent is installed and reachable
    pub guest_agent: Option<GuestAgentInfo>,
    /// Console endpoint, when one has been allocated
    pub console: Option<ConsoleStatus>,
}

/// Live resource usage as last observed from the owning node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_used_mib: u64,
    pub disk_read_bps: u64,
    pub disk_write_bps: u64,
    pub net_rx_bps: u64,
    pub net_tx_bps: u64,
}

/// Guest agent report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuestAgentInfo {
    pub installed: bool,
    pub version: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub kernel: String,
    pub uptime_sec: u64,
    pub ip_addresses: Vec<String>,
}

/// Console endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleStatus {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

// =============================================================================
// HELPERS
// =============================================================================

/// Generate a MAC address under the QEMU/KVM OUI.
pub fn generate_mac() -> String {
    let suffix: [u8; 3] = rand::random();
    format!(
        "{}:{:02x}:{:02x}:{:02x}",
        QEMU_MAC_OUI, suffix[0], suffix[1], suffix[2]
    )
}
