//! Orchestrator integration tests: device hot-plug, snapshots, console
//! access and guest agent health.

mod common;

use common::Harness;
use limiquantix_controller::requests::{
    AttachCdromRequest, AttachDiskRequest, AttachNicRequest, CreateSnapshotRequest,
    DeleteSnapshotRequest, DetachCdromRequest, DetachDiskRequest, DetachNicRequest,
    EjectIsoRequest, ListEventsRequest, MountIsoRequest, ResizeDiskRequest,
    RevertSnapshotRequest,
};
use limiquantix_controller::{ControlPlaneError, SnapshotRepository, VmRepository};
use limiquantix_domain::{DisplaySpec, DisplayType, VmState};
use limiquantix_nodeclient::VmPowerState;

// =============================================================================
// Disks
// =============================================================================

#[tokio::test]
async fn test_attach_disk_to_stopped_vm_is_config_only() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Stopped, "node-a", &agent, VmPowerState::Stopped)
        .await;

    let updated = harness
        .orchestrator
        .attach_disk(AttachDiskRequest {
            vm_id: vm.id.clone(),
            size_gib: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.spec.disks.len(), 2);
    assert_eq!(updated.spec.disks[1].name, "disk-1");
    assert_eq!(updated.spec.disks[1].bus, "virtio");
    assert!(agent.calls().is_empty());

    // The audit event carries the device facts as structured metadata
    let events = harness
        .orchestrator
        .list_events(ListEventsRequest {
            vm_id: vm.id.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    let attach = events
        .iter()
        .find(|e| e.message.contains("attached"))
        .unwrap();
    assert_eq!(
        attach.metadata.get("size_gib"),
        Some(&serde_json::Value::from(50u64))
    );
    assert_eq!(
        attach.metadata.get("bus"),
        Some(&serde_json::Value::from("virtio"))
    );
}

#[tokio::test]
async fn test_attach_disk_hot_plugs_into_running_vm() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    harness
        .orchestrator
        .attach_disk(AttachDiskRequest {
            vm_id: vm.id.clone(),
            size_gib: 50,
            bus: "scsi".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(agent
        .calls()
        .contains(&format!("attach_disk {} disk-1", vm.id)));
}

#[tokio::test]
async fn test_detach_boot_disk_is_rejected() {
    let harness = Harness::new();
    let vm = harness.seed_vm("web", VmState::Stopped, "").await;

    let err = harness
        .orchestrator
        .detach_disk(DetachDiskRequest {
            vm_id: vm.id.clone(),
            disk_name: "disk-0".to_string(),
            force: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::FailedPrecondition(_)));

    let after = harness.repo.get(&vm.id).await.unwrap();
    assert_eq!(after.spec.disks.len(), 1);
}

#[tokio::test]
async fn test_detach_disk_from_running_vm_requires_force() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;
    harness
        .orchestrator
        .attach_disk(AttachDiskRequest {
            vm_id: vm.id.clone(),
            size_gib: 50,
            ..Default::default()
        })
        .await
        .unwrap();

    let err = harness
        .orchestrator
        .detach_disk(DetachDiskRequest {
            vm_id: vm.id.clone(),
            disk_name: "disk-1".to_string(),
            force: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::FailedPrecondition(_)));

    let updated = harness
        .orchestrator
        .detach_disk(DetachDiskRequest {
            vm_id: vm.id.clone(),
            disk_name: "disk-1".to_string(),
            force: true,
        })
        .await
        .unwrap();
    assert_eq!(updated.spec.disks.len(), 1);
    assert!(agent
        .calls()
        .contains(&format!("detach_disk {} disk-1", vm.id)));
}

#[tokio::test]
async fn test_resize_disk_smaller_is_rejected_without_agent_call() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Stopped, "node-a", &agent, VmPowerState::Stopped)
        .await;

    let err = harness
        .orchestrator
        .resize_disk(ResizeDiskRequest {
            vm_id: vm.id.clone(),
            disk_name: "disk-0".to_string(),
            new_size_gib: 10,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ControlPlaneError::InvalidArgument { .. }));
    assert!(err
        .to_string()
        .contains("new size must be larger than current size"));
    assert!(agent.calls().is_empty());

    let after = harness.repo.get(&vm.id).await.unwrap();
    assert_eq!(after.spec.disks[0].size_gib, 20);
}

#[tokio::test]
async fn test_resize_disk_forwards_bytes_to_agent() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Stopped, "node-a", &agent, VmPowerState::Stopped)
        .await;

    let updated = harness
        .orchestrator
        .resize_disk(ResizeDiskRequest {
            vm_id: vm.id.clone(),
            disk_name: "disk-0".to_string(),
            new_size_gib: 40,
        })
        .await
        .unwrap();

    assert_eq!(updated.spec.disks[0].size_gib, 40);
    let expected_bytes = 40u64 << 30;
    assert!(agent
        .calls()
        .contains(&format!("resize_volume  vol-boot {expected_bytes}")));
}

// =============================================================================
// NICs
// =============================================================================

#[tokio::test]
async fn test_attach_nic_generates_mac_under_qemu_oui() {
    let harness = Harness::new();
    let vm = harness.seed_vm("web", VmState::Stopped, "").await;

    let updated = harness
        .orchestrator
        .attach_nic(AttachNicRequest {
            vm_id: vm.id.clone(),
            network_id: "net-backend".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let nic = &updated.spec.nics[1];
    assert_eq!(nic.name, "nic-1");
    assert!(nic.mac_address.as_deref().unwrap().starts_with("52:54:00:"));
    assert_eq!(nic.model, "virtio");
}

#[tokio::test]
async fn test_detach_primary_nic_is_rejected() {
    let harness = Harness::new();
    let vm = harness.seed_vm("web", VmState::Stopped, "").await;

    let err = harness
        .orchestrator
        .detach_nic(DetachNicRequest {
            vm_id: vm.id.clone(),
            nic_name: "nic-0".to_string(),
            force: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::FailedPrecondition(_)));

    let after = harness.repo.get(&vm.id).await.unwrap();
    assert_eq!(after.spec.nics.len(), 1);
}

#[tokio::test]
async fn test_detach_secondary_nic() {
    let harness = Harness::new();
    let vm = harness.seed_vm("web", VmState::Stopped, "").await;
    harness
        .orchestrator
        .attach_nic(AttachNicRequest {
            vm_id: vm.id.clone(),
            network_id: "net-backend".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let updated = harness
        .orchestrator
        .detach_nic(DetachNicRequest {
            vm_id: vm.id.clone(),
            nic_name: "nic-1".to_string(),
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(updated.spec.nics.len(), 1);
}

// =============================================================================
// CD-ROM drives and media
// =============================================================================

#[tokio::test]
async fn test_cdrom_attach_detach_are_control_plane_only() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    let updated = harness
        .orchestrator
        .attach_cdrom(AttachCdromRequest {
            vm_id: vm.id.clone(),
            iso_path: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.spec.cdroms.len(), 1);
    assert_eq!(updated.spec.cdroms[0].name, "cdrom-0");
    assert!(agent.calls().is_empty());

    let updated = harness
        .orchestrator
        .detach_cdrom(DetachCdromRequest {
            vm_id: vm.id.clone(),
            cdrom_name: "cdrom-0".to_string(),
        })
        .await
        .unwrap();
    assert!(updated.spec.cdroms.is_empty());
    assert!(agent.calls().is_empty());
}

#[tokio::test]
async fn test_mount_iso_computes_device_name_after_disks() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    // One disk, so cdrom index 0 lands on sdb
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;
    harness
        .orchestrator
        .attach_cdrom(AttachCdromRequest {
            vm_id: vm.id.clone(),
            iso_path: None,
        })
        .await
        .unwrap();

    let updated = harness
        .orchestrator
        .mount_iso(MountIsoRequest {
            vm_id: vm.id.clone(),
            cdrom_name: "cdrom-0".to_string(),
            iso_path: "/isos/tools.iso".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        updated.spec.cdroms[0].iso_path.as_deref(),
        Some("/isos/tools.iso")
    );
    assert!(agent
        .calls()
        .contains(&format!("change_media {} sdb /isos/tools.iso", vm.id)));
}

#[tokio::test]
async fn test_eject_iso_sends_empty_path() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;
    harness
        .orchestrator
        .attach_cdrom(AttachCdromRequest {
            vm_id: vm.id.clone(),
            iso_path: Some("/isos/tools.iso".to_string()),
        })
        .await
        .unwrap();

    let updated = harness
        .orchestrator
        .eject_iso(EjectIsoRequest {
            vm_id: vm.id.clone(),
            cdrom_name: "cdrom-0".to_string(),
        })
        .await
        .unwrap();

    assert!(updated.spec.cdroms[0].iso_path.is_none());
    assert!(agent
        .calls()
        .contains(&format!("change_media {} sdb ", vm.id)));
}

#[tokio::test]
async fn test_media_change_on_stopped_vm_skips_agent() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Stopped, "node-a", &agent, VmPowerState::Stopped)
        .await;
    harness
        .orchestrator
        .attach_cdrom(AttachCdromRequest {
            vm_id: vm.id.clone(),
            iso_path: None,
        })
        .await
        .unwrap();

    harness
        .orchestrator
        .mount_iso(MountIsoRequest {
            vm_id: vm.id.clone(),
            cdrom_name: "cdrom-0".to_string(),
            iso_path: "/isos/install.iso".to_string(),
        })
        .await
        .unwrap();

    assert!(agent.calls().is_empty());
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn test_create_snapshot_translates_include_memory() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    let snapshot = harness
        .orchestrator
        .create_snapshot(CreateSnapshotRequest {
            vm_id: vm.id.clone(),
            name: "pre-upgrade".to_string(),
            description: "before 2.0".to_string(),
            include_memory: false,
            quiesce: true,
        })
        .await
        .unwrap();

    assert_eq!(snapshot.vm_id, vm.id);
    assert!(!snapshot.memory_included);
    assert!(agent.calls().contains(&format!(
        "create_snapshot {} pre-upgrade quiesce=true disk_only=true",
        vm.id
    )));

    // Mirror carries the record, best-effort
    let mirrored = harness.mirror.list(&vm.id).await.unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].name, "pre-upgrade");
}

#[tokio::test]
async fn test_create_snapshot_requires_node() {
    let harness = Harness::new();
    let vm = harness.seed_vm("floating", VmState::Stopped, "").await;

    let err = harness
        .orchestrator
        .create_snapshot(CreateSnapshotRequest {
            vm_id: vm.id.clone(),
            name: "snap".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ControlPlaneError::FailedPrecondition(_)));
}

#[tokio::test]
async fn test_list_snapshots_reconciles_mirror() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    // Stale mirror entry that the agent does not know about
    harness
        .mirror
        .save(limiquantix_domain::Snapshot {
            id: "stale".to_string(),
            vm_id: vm.id.clone(),
            name: "stale".to_string(),
            description: String::new(),
            parent_id: None,
            memory_included: false,
            quiesced: false,
            size_bytes: 0,
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap();

    harness
        .orchestrator
        .create_snapshot(CreateSnapshotRequest {
            vm_id: vm.id.clone(),
            name: "real".to_string(),
            include_memory: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let listed = harness.orchestrator.list_snapshots(&vm.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "real");

    // Mirror now matches the agent view; the stale entry is gone
    let mirrored = harness.mirror.list(&vm.id).await.unwrap();
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0].name, "real");
}

#[tokio::test]
async fn test_list_snapshots_on_detached_vm_is_empty() {
    let harness = Harness::new();
    let vm = harness.seed_vm("floating", VmState::Stopped, "").await;
    let listed = harness.orchestrator.list_snapshots(&vm.id).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_revert_starts_vm_when_requested() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    let snapshot = harness
        .orchestrator
        .create_snapshot(CreateSnapshotRequest {
            vm_id: vm.id.clone(),
            name: "golden".to_string(),
            include_memory: true,
            ..Default::default()
        })
        .await
        .unwrap();

    harness
        .orchestrator
        .stop_vm(limiquantix_controller::requests::StopVmRequest {
            vm_id: vm.id.clone(),
            force: false,
        })
        .await
        .unwrap();

    let reverted = harness
        .orchestrator
        .revert_to_snapshot(RevertSnapshotRequest {
            vm_id: vm.id.clone(),
            snapshot_id: snapshot.id.clone(),
            start_after_revert: true,
        })
        .await
        .unwrap();

    assert!(agent
        .calls()
        .contains(&format!("revert_snapshot {} {}", vm.id, snapshot.id)));
    assert_eq!(reverted.status.state, VmState::Running);
}

#[tokio::test]
async fn test_delete_snapshot_updates_mirror() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    let snapshot = harness
        .orchestrator
        .create_snapshot(CreateSnapshotRequest {
            vm_id: vm.id.clone(),
            name: "tmp".to_string(),
            include_memory: true,
            ..Default::default()
        })
        .await
        .unwrap();

    harness
        .orchestrator
        .delete_snapshot(DeleteSnapshotRequest {
            vm_id: vm.id.clone(),
            snapshot_id: snapshot.id.clone(),
        })
        .await
        .unwrap();

    assert!(harness.mirror.list(&vm.id).await.unwrap().is_empty());
    assert!(harness
        .orchestrator
        .list_snapshots(&vm.id)
        .await
        .unwrap()
        .is_empty());
}

// =============================================================================
// Console and guest agent
// =============================================================================

#[tokio::test]
async fn test_console_requires_running_vm() {
    let harness = Harness::new();
    let vm = harness.seed_vm("idle", VmState::Stopped, "").await;
    let err = harness.orchestrator.get_console(&vm.id).await.unwrap_err();
    assert!(matches!(err, ControlPlaneError::FailedPrecondition(_)));
}

#[tokio::test]
async fn test_console_for_detached_vm_is_loopback_default() {
    let harness = Harness::new();
    let vm = harness.seed_vm("floating", VmState::Running, "").await;

    let console = harness.orchestrator.get_console(&vm.id).await.unwrap();
    assert_eq!(console.protocol, "vnc");
    assert_eq!(console.host, "127.0.0.1");
    assert_eq!(console.port, 5900);
}

#[tokio::test]
async fn test_console_comes_from_agent_when_reachable() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    let console = harness.orchestrator.get_console(&vm.id).await.unwrap();
    assert_eq!(console.protocol, "vnc");
    assert_eq!(console.port, 5901);
}

#[tokio::test]
async fn test_console_falls_back_to_display_spec_on_agent_failure() {
    let harness = Harness::new();
    harness.add_node_with_ip("node-a", "192.168.0.53/32");
    harness.connector.set_unreachable("node-a");

    let mut vm = harness.seed_vm("web", VmState::Running, "node-a").await;
    vm.spec.display = Some(DisplaySpec {
        display_type: DisplayType::Spice,
        port: Some(5905),
        password: Some("secret".to_string()),
    });
    let vm = harness.repo.update(vm).await.unwrap();

    let console = harness.orchestrator.get_console(&vm.id).await.unwrap();
    assert_eq!(console.protocol, "spice");
    assert_eq!(console.host, "192.168.0.53");
    assert_eq!(console.port, 5905);
    assert_eq!(console.password.as_deref(), Some("secret"));
}

#[tokio::test]
async fn test_ping_agent_reports_health() {
    let harness = Harness::new();
    let agent = harness.add_node("node-a");
    let vm = harness
        .seed_vm_with_domain("web", VmState::Running, "node-a", &agent, VmPowerState::Running)
        .await;

    let health = harness.orchestrator.ping_agent(&vm.id).await.unwrap();
    assert!(health.connected);
    assert_eq!(health.version, "0.1.27");
    assert!(health.error.is_none());
}

#[tokio::test]
async fn test_ping_agent_never_hard_fails_on_unreachable_node() {
    let harness = Harness::new();
    harness.add_node("node-a");
    harness.connector.set_unreachable("node-a");
    let vm = harness.seed_vm("web", VmState::Running, "node-a").await;

    let health = harness.orchestrator.ping_agent(&vm.id).await.unwrap();
    assert!(!health.connected);
    assert!(health.error.is_some());
}
