//! Device management: disks, NICs, CD-ROM drives and media.
//!
//! Hot-plug happens through the node daemon when the VM is live; the
//! persisted spec is the source of truth either way. Index 0 of both the
//! disk and NIC sequences is protected: the boot disk and the primary NIC
//! can never be detached.

use limiquantix_domain::{
    generate_mac, CdromSpec, DiskSpec, EventSeverity, EventType, NicSpec, VirtualMachine, VmEvent,
};
use limiquantix_nodeclient::{agent_disk, agent_nic};

use crate::error::{ControlPlaneError, Result};
use crate::requests::{
    AttachCdromRequest, AttachDiskRequest, AttachNicRequest, DetachCdromRequest,
    DetachDiskRequest, DetachNicRequest, EjectIsoRequest, MountIsoRequest, ResizeDiskRequest,
};
use crate::validation;

use super::Orchestrator;

/// Device node the agent sees for a CD-ROM drive.
///
/// Drives are enumerated after all disks: with N disks, CD-ROM K lives at
/// `sd<'a' + N + K>`.
fn cdrom_device_name(disk_count: usize, cdrom_index: usize) -> String {
    let letter = (b'a' + (disk_count + cdrom_index) as u8) as char;
    format!("sd{letter}")
}

impl Orchestrator {
    // =========================================================================
    // Disks
    // =========================================================================

    /// Attach a disk, hot-plugging when the VM runs.
    pub async fn attach_disk(&self, req: AttachDiskRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        validation::into_error(validation::validate_disk_size("size_gib", req.size_gib))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let disk = DiskSpec {
            name: format!("disk-{}", vm.spec.disks.len()),
            volume_id: String::new(),
            size_gib: req.size_gib,
            bus: if req.bus.is_empty() {
                "virtio".to_string()
            } else {
                req.bus
            },
            cache: if req.cache.is_empty() {
                "none".to_string()
            } else {
                req.cache
            },
            boot_order: 0,
            backing_file: None,
            storage_pool_id: req.storage_pool_id,
            readonly: req.readonly,
        };

        if vm.status.state.is_running() {
            if let Some(node_id) = vm.node_id() {
                let agent = self.agent_for_node(node_id).await?;
                agent
                    .attach_disk(&vm.id, agent_disk(&disk))
                    .await
                    .map_err(|e| {
                        ControlPlaneError::Internal(format!("failed to hot-plug disk: {e}"))
                    })?;
            }
        }

        let disk_name = disk.name.clone();
        let disk_bus = disk.bus.clone();
        vm.spec.disks.push(disk);
        let vm = self.persist_spec(vm).await?;
        self.events
            .record(
                VmEvent::new(
                    &vm.id,
                    EventType::Disk,
                    EventSeverity::Info,
                    format!("Disk {disk_name} attached"),
                )
                .with_metadata("size_gib", req.size_gib)
                .with_metadata("bus", disk_bus),
            )
            .await;
        Ok(vm)
    }

    /// Detach a disk by name. The boot disk (index 0) is unremovable, and
    /// hot-unplug from a running VM must be forced.
    pub async fn detach_disk(&self, req: DetachDiskRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let index = vm
            .spec
            .disks
            .iter()
            .position(|d| d.name == req.disk_name)
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("disk {} on VM {}", req.disk_name, vm.id))
            })?;
        if index == 0 {
            return Err(ControlPlaneError::FailedPrecondition(
                "the boot disk cannot be detached".to_string(),
            ));
        }

        if vm.status.state.is_running() {
            if !req.force {
                return Err(ControlPlaneError::FailedPrecondition(
                    "detaching a disk from a running VM requires force".to_string(),
                ));
            }
            if let Some(node_id) = vm.node_id() {
                let agent = self.agent_for_node(node_id).await?;
                agent
                    .detach_disk(&vm.id, &req.disk_name)
                    .await
                    .map_err(|e| {
                        ControlPlaneError::Internal(format!("failed to hot-unplug disk: {e}"))
                    })?;
            }
        }

        vm.spec.disks.remove(index);
        let vm = self.persist_spec(vm).await?;
        self.record_event(
            &vm.id,
            EventType::Disk,
            format!("Disk {} detached", req.disk_name),
        )
        .await;
        Ok(vm)
    }

    /// Grow a disk. Shrinking is never allowed.
    pub async fn resize_disk(&self, req: ResizeDiskRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        validation::into_error(validation::validate_disk_size(
            "new_size_gib",
            req.new_size_gib,
        ))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let node_id = vm.status.node_id.clone();
        let disk = vm
            .spec
            .disks
            .iter_mut()
            .find(|d| d.name == req.disk_name)
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("disk {} on VM {}", req.disk_name, req.vm_id))
            })?;
        if req.new_size_gib <= disk.size_gib {
            return Err(ControlPlaneError::invalid_argument(
                "new_size_gib",
                "new size must be larger than current size",
            ));
        }

        let pool_id = disk.storage_pool_id.clone().unwrap_or_default();
        let volume_id = disk.volume_id.clone();
        let previous_size_gib = disk.size_gib;
        disk.size_gib = req.new_size_gib;

        if !node_id.is_empty() {
            let agent = self.agent_for_node(&node_id).await?;
            agent
                .resize_volume(&pool_id, &volume_id, req.new_size_gib << 30)
                .await
                .map_err(|e| {
                    ControlPlaneError::Internal(format!("failed to resize volume: {e}"))
                })?;
        }

        let vm = self.persist_spec(vm).await?;
        self.events
            .record(
                VmEvent::new(
                    &vm.id,
                    EventType::Disk,
                    EventSeverity::Info,
                    format!("Disk {} resized to {} GiB", req.disk_name, req.new_size_gib),
                )
                .with_metadata("previous_size_gib", previous_size_gib)
                .with_metadata("new_size_gib", req.new_size_gib),
            )
            .await;
        Ok(vm)
    }

    // =========================================================================
    // NICs
    // =========================================================================

    /// Attach a NIC, generating a MAC under the QEMU OUI when none is
    /// given. Hot-plugs when the VM runs.
    pub async fn attach_nic(&self, req: AttachNicRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let nic = NicSpec {
            name: format!("nic-{}", vm.spec.nics.len()),
            network_id: req.network_id,
            mac_address: Some(req.mac_address.unwrap_or_else(generate_mac)),
            model: if req.model.is_empty() {
                "virtio".to_string()
            } else {
                req.model
            },
            security_groups: req.security_groups,
        };

        if vm.status.state.is_running() {
            if let Some(node_id) = vm.node_id() {
                let agent = self.agent_for_node(node_id).await?;
                agent.attach_nic(&vm.id, agent_nic(&nic)).await.map_err(|e| {
                    ControlPlaneError::Internal(format!("failed to hot-plug NIC: {e}"))
                })?;
            }
        }

        let nic_name = nic.name.clone();
        vm.spec.nics.push(nic);
        let vm = self.persist_spec(vm).await?;
        self.record_event(
            &vm.id,
            EventType::Network,
            format!("NIC {nic_name} attached"),
        )
        .await;
        Ok(vm)
    }

    /// Detach a NIC by name. The primary NIC (index 0) is unremovable.
    pub async fn detach_nic(&self, req: DetachNicRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let index = vm
            .spec
            .nics
            .iter()
            .position(|n| n.name == req.nic_name)
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("NIC {} on VM {}", req.nic_name, vm.id))
            })?;
        if index == 0 {
            return Err(ControlPlaneError::FailedPrecondition(
                "the primary NIC cannot be detached".to_string(),
            ));
        }

        if vm.status.state.is_running() {
            if !req.force {
                return Err(ControlPlaneError::FailedPrecondition(
                    "detaching a NIC from a running VM requires force".to_string(),
                ));
            }
            if let Some(node_id) = vm.node_id() {
                let agent = self.agent_for_node(node_id).await?;
                agent.detach_nic(&vm.id, &req.nic_name).await.map_err(|e| {
                    ControlPlaneError::Internal(format!("failed to hot-unplug NIC: {e}"))
                })?;
            }
        }

        vm.spec.nics.remove(index);
        let vm = self.persist_spec(vm).await?;
        self.record_event(
            &vm.id,
            EventType::Network,
            format!("NIC {} detached", req.nic_name),
        )
        .await;
        Ok(vm)
    }

    // =========================================================================
    // CD-ROM drives and media
    // =========================================================================

    /// Add a CD-ROM drive. Drive changes are inactive-config only and take
    /// effect on the next start.
    pub async fn attach_cdrom(&self, req: AttachCdromRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let cdrom = CdromSpec {
            name: format!("cdrom-{}", vm.spec.cdroms.len()),
            iso_path: req.iso_path,
            connected: true,
        };

        let cdrom_name = cdrom.name.clone();
        vm.spec.cdroms.push(cdrom);
        let vm = self.persist_spec(vm).await?;
        self.record_event(
            &vm.id,
            EventType::Disk,
            format!("CD-ROM {cdrom_name} attached"),
        )
        .await;
        Ok(vm)
    }

    /// Remove a CD-ROM drive.
    pub async fn detach_cdrom(&self, req: DetachCdromRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        let index = vm
            .spec
            .cdroms
            .iter()
            .position(|c| c.name == req.cdrom_name)
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("CD-ROM {} on VM {}", req.cdrom_name, vm.id))
            })?;

        vm.spec.cdroms.remove(index);
        let vm = self.persist_spec(vm).await?;
        self.record_event(
            &vm.id,
            EventType::Disk,
            format!("CD-ROM {} detached", req.cdrom_name),
        )
        .await;
        Ok(vm)
    }

    /// Mount an ISO, changing media live when the VM runs.
    pub async fn mount_iso(&self, req: MountIsoRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        if req.iso_path.is_empty() {
            return Err(ControlPlaneError::invalid_argument(
                "iso_path",
                "must not be empty",
            ));
        }

        self.change_cdrom_media(&req.vm_id, &req.cdrom_name, Some(req.iso_path))
            .await
    }

    /// Eject the media of a CD-ROM drive.
    pub async fn eject_iso(&self, req: EjectIsoRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        self.change_cdrom_media(&req.vm_id, &req.cdrom_name, None).await
    }

    async fn change_cdrom_media(
        &self,
        vm_id: &str,
        cdrom_name: &str,
        iso_path: Option<String>,
    ) -> Result<VirtualMachine> {
        let mut vm = self.fetch(vm_id).await?;
        let index = vm
            .spec
            .cdroms
            .iter()
            .position(|c| c.name == cdrom_name)
            .ok_or_else(|| {
                ControlPlaneError::NotFound(format!("CD-ROM {cdrom_name} on VM {vm_id}"))
            })?;

        if vm.status.state.is_running() {
            if let Some(node_id) = vm.node_id() {
                let device = cdrom_device_name(vm.spec.disks.len(), index);
                let agent = self.agent_for_node(node_id).await?;
                agent
                    .change_media(&vm.id, &device, iso_path.as_deref())
                    .await
                    .map_err(|e| {
                        ControlPlaneError::Internal(format!("failed to change media: {e}"))
                    })?;
            }
        }

        let message = match &iso_path {
            Some(path) => format!("ISO {path} mounted in {cdrom_name}"),
            None => format!("Media ejected from {cdrom_name}"),
        };
        vm.spec.cdroms[index].iso_path = iso_path;
        let vm = self.persist_spec(vm).await?;
        self.record_event(&vm.id, EventType::Disk, message).await;
        Ok(vm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdrom_device_names_follow_disks() {
        assert_eq!(cdrom_device_name(0, 0), "sda");
        assert_eq!(cdrom_device_name(1, 0), "sdb");
        assert_eq!(cdrom_device_name(2, 1), "sdd");
        assert_eq!(cdrom_device_name(3, 0), "sdd");
    }
}
