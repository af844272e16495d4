//! The node agent call surface.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::*;

/// VM-oriented operations every node agent client exposes.
///
/// This is the contract the orchestrator programs against. The production
/// implementation binds it to the node daemon's RPC surface; the mock backs
/// tests and development.
#[async_trait]
pub trait NodeAgent: Send + Sync + std::fmt::Debug {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Define and provision a VM on this node (does not start it).
    ///
    /// Returns the hypervisor's id for the domain.
    async fn create_vm(&self, definition: VmDefinition) -> Result<String>;

    /// Remove the domain, optionally deleting its volumes.
    async fn delete_vm(&self, vm_id: &str, delete_volumes: bool) -> Result<()>;

    /// Start a defined VM.
    async fn start_vm(&self, vm_id: &str) -> Result<()>;

    /// Graceful stop: ACPI shutdown with a hypervisor-side grace window.
    async fn stop_vm(&self, vm_id: &str, timeout: Duration) -> Result<()>;

    /// Immediate power-off.
    async fn force_stop_vm(&self, vm_id: &str) -> Result<()>;

    /// Reboot a running VM.
    async fn reboot_vm(&self, vm_id: &str) -> Result<()>;

    /// Freeze execution.
    async fn pause_vm(&self, vm_id: &str) -> Result<()>;

    /// Resume a paused VM.
    async fn resume_vm(&self, vm_id: &str) -> Result<()>;

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current power state, resource usage and guest agent report.
    async fn get_vm_status(&self, vm_id: &str) -> Result<AgentVmStatus>;

    /// Console connection information (VNC/SPICE).
    async fn get_console(&self, vm_id: &str) -> Result<ConsoleEndpoint>;

    /// Guest agent liveness.
    async fn ping_guest_agent(&self, vm_id: &str) -> Result<AgentHealth>;

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Create a snapshot. `disk_only` skips the memory image.
    async fn create_snapshot(
        &self,
        vm_id: &str,
        name: &str,
        description: &str,
        quiesce: bool,
        disk_only: bool,
    ) -> Result<AgentSnapshot>;

    /// List the hypervisor's snapshot tree for a VM.
    async fn list_snapshots(&self, vm_id: &str) -> Result<Vec<AgentSnapshot>>;

    /// Revert to a snapshot.
    async fn revert_snapshot(&self, vm_id: &str, snapshot_id: &str) -> Result<()>;

    /// Delete a snapshot.
    async fn delete_snapshot(&self, vm_id: &str, snapshot_id: &str) -> Result<()>;

    // =========================================================================
    // Devices
    // =========================================================================

    /// Hot-plug a disk.
    async fn attach_disk(&self, vm_id: &str, disk: AgentDisk) -> Result<()>;

    /// Hot-unplug a disk by device name.
    async fn detach_disk(&self, vm_id: &str, disk_name: &str) -> Result<()>;

    /// Grow a volume to the given size in bytes.
    async fn resize_volume(&self, pool_id: &str, volume_id: &str, new_size_bytes: u64)
        -> Result<()>;

    /// Hot-plug a network interface.
    async fn attach_nic(&self, vm_id: &str, nic: AgentNic) -> Result<()>;

    /// Hot-unplug a network interface by device name.
    async fn detach_nic(&self, vm_id: &str, nic_name: &str) -> Result<()>;

    /// Change CD-ROM media. `None` ejects the current ISO.
    async fn change_media(&self, vm_id: &str, device: &str, iso_path: Option<&str>) -> Result<()>;
}
