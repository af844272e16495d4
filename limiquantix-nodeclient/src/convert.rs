//! Translation from control-plane records to agent wire shapes.

use limiquantix_domain::{CdromSpec, DiskSpec, NicSpec, VirtualMachine};

use crate::types::*;

/// Build the agent-side definition for a VM record.
///
/// The control plane forwards most fields verbatim; the mappings it owns are
/// the bus strings, `bootable` inferred from the boot order, the QCOW2
/// default format, the CPU model string forwarded as `cpu_mode`, and the
/// guest OS tag.
pub fn vm_definition(vm: &VirtualMachine) -> VmDefinition {
    let spec = &vm.spec;

    VmDefinition {
        id: vm.id.clone(),
        name: vm.name.clone(),
        cpu: AgentCpu {
            cores: spec.cpu.cores,
            sockets: spec.cpu.sockets,
            threads_per_core: spec.cpu.threads_per_core,
            cpu_mode: spec.cpu.model.clone().unwrap_or_default(),
        },
        memory: AgentMemory {
            size_mib: spec.memory.size_mib,
            balloon_limit_mib: spec.memory.balloon_limit_mib.unwrap_or_default(),
            hugepages: spec.memory.hugepages_enabled,
        },
        disks: spec.disks.iter().map(agent_disk).collect(),
        nics: spec.nics.iter().map(agent_nic).collect(),
        cdroms: spec.cdroms.iter().map(agent_cdrom).collect(),
        display: spec.display.as_ref().map(|d| AgentDisplay {
            display_type: d.display_type.as_str().to_string(),
            port: d.port.map(u32::from).unwrap_or_default(),
            password: d.password.clone().unwrap_or_default(),
        }),
        guest_os: spec
            .guest_os
            .map(|family| family.wire_tag().to_string())
            .unwrap_or_default(),
        cloud_init: spec.provisioning.as_ref().map(|p| AgentCloudInit {
            user_data: p.user_data.clone(),
            meta_data: p.meta_data.clone(),
            network_config: p.network_config.clone(),
            vendor_data: p.vendor_data.clone(),
        }),
        boot_order: spec.boot.order.iter().map(|d| d.as_str().to_string()).collect(),
    }
}

/// Map a disk spec to the agent wire.
pub fn agent_disk(disk: &DiskSpec) -> AgentDisk {
    AgentDisk {
        name: disk.name.clone(),
        volume_id: disk.volume_id.clone(),
        size_gib: disk.size_gib,
        bus: DiskBus::from_wire(&disk.bus),
        format: DiskFormat::Qcow2,
        cache: disk.cache.clone(),
        bootable: disk.boot_order > 0,
        readonly: disk.readonly,
        backing_file: disk.backing_file.clone(),
        storage_pool_id: disk.storage_pool_id.clone(),
    }
}

/// Map a NIC spec to the agent wire.
pub fn agent_nic(nic: &NicSpec) -> AgentNic {
    AgentNic {
        name: nic.name.clone(),
        network_id: nic.network_id.clone(),
        mac_address: nic.mac_address.clone().unwrap_or_default(),
        model: nic.model.clone(),
        security_groups: nic.security_groups.clone(),
    }
}

fn agent_cdrom(cdrom: &CdromSpec) -> AgentCdrom {
    AgentCdrom {
        name: cdrom.name.clone(),
        iso_path: cdrom.iso_path.clone().unwrap_or_default(),
        connected: cdrom.connected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limiquantix_domain::{CpuSpec, GuestOsFamily, VmSpec};

    fn disk(bus: &str, boot_order: u32) -> DiskSpec {
        DiskSpec {
            name: "disk-0".to_string(),
            bus: bus.to_string(),
            boot_order,
            ..Default::default()
        }
    }

    #[test]
    fn test_bootable_inferred_from_boot_order() {
        assert!(agent_disk(&disk("virtio", 1)).bootable);
        assert!(agent_disk(&disk("virtio", 3)).bootable);
        assert!(!agent_disk(&disk("virtio", 0)).bootable);
    }

    #[test]
    fn test_disk_format_defaults_to_qcow2() {
        assert_eq!(agent_disk(&disk("scsi", 0)).format, DiskFormat::Qcow2);
    }

    #[test]
    fn test_cpu_model_forwarded_as_cpu_mode() {
        let mut vm = VirtualMachine::new("vm-a", "p1");
        vm.spec = VmSpec {
            cpu: CpuSpec {
                model: Some("host-passthrough".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let definition = vm_definition(&vm);
        assert_eq!(definition.cpu.cpu_mode, "host-passthrough");
    }

    #[test]
    fn test_guest_os_tag_emitted() {
        let mut vm = VirtualMachine::new("vm-a", "p1");
        vm.spec.guest_os = Some(GuestOsFamily::WindowsServer);
        assert_eq!(vm_definition(&vm).guest_os, "windows_server");

        vm.spec.guest_os = None;
        assert_eq!(vm_definition(&vm).guest_os, "");
    }

    #[test]
    fn test_missing_mac_sent_empty() {
        let nic = NicSpec::default();
        assert_eq!(agent_nic(&nic).mac_address, "");
    }
}
