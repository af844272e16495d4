//! The operator-facing service surface.
//!
//! One request/response pair per operation, errors expressed as
//! `tonic::Status` with the fixed code vocabulary. The transport binding
//! that puts this on the network lives with the deployment; handlers here
//! are shaped so that binding is a pass-through.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use limiquantix_domain::{Snapshot, VirtualMachine, VmEvent};

use crate::orchestrator::Orchestrator;
use crate::requests::*;

/// VM control service.
#[derive(Clone)]
pub struct VmService {
    orchestrator: Arc<Orchestrator>,
}

impl VmService {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    pub async fn create_vm(
        &self,
        request: Request<CreateVmRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.create_vm(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn get_vm(
        &self,
        request: Request<String>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.get_vm(&request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn list_vms(
        &self,
        request: Request<ListVmsRequest>,
    ) -> Result<Response<ListVmsResponse>, Status> {
        let page = self.orchestrator.list_vms(request.into_inner()).await?;
        Ok(Response::new(page))
    }

    pub async fn update_vm(
        &self,
        request: Request<UpdateVmRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.update_vm(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn delete_vm(
        &self,
        request: Request<DeleteVmRequest>,
    ) -> Result<Response<()>, Status> {
        self.orchestrator.delete_vm(request.into_inner()).await?;
        Ok(Response::new(()))
    }

    // =========================================================================
    // Power
    // =========================================================================

    pub async fn start_vm(
        &self,
        request: Request<String>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.start_vm(&request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn stop_vm(
        &self,
        request: Request<StopVmRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.stop_vm(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn reboot_vm(
        &self,
        request: Request<String>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.reboot_vm(&request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn pause_vm(
        &self,
        request: Request<String>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.pause_vm(&request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn resume_vm(
        &self,
        request: Request<String>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.resume_vm(&request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn suspend_vm(
        &self,
        request: Request<String>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.suspend_vm(&request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn reset_vm_state(
        &self,
        request: Request<ResetVmStateRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.reset_vm_state(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    // =========================================================================
    // Clone and snapshots
    // =========================================================================

    pub async fn clone_vm(
        &self,
        request: Request<CloneVmRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.clone_vm(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn create_snapshot(
        &self,
        request: Request<CreateSnapshotRequest>,
    ) -> Result<Response<Snapshot>, Status> {
        let snapshot = self
            .orchestrator
            .create_snapshot(request.into_inner())
            .await?;
        Ok(Response::new(snapshot))
    }

    pub async fn list_snapshots(
        &self,
        request: Request<String>,
    ) -> Result<Response<Vec<Snapshot>>, Status> {
        let snapshots = self
            .orchestrator
            .list_snapshots(&request.into_inner())
            .await?;
        Ok(Response::new(snapshots))
    }

    pub async fn revert_to_snapshot(
        &self,
        request: Request<RevertSnapshotRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self
            .orchestrator
            .revert_to_snapshot(request.into_inner())
            .await?;
        Ok(Response::new(vm))
    }

    pub async fn delete_snapshot(
        &self,
        request: Request<DeleteSnapshotRequest>,
    ) -> Result<Response<()>, Status> {
        self.orchestrator
            .delete_snapshot(request.into_inner())
            .await?;
        Ok(Response::new(()))
    }

    // =========================================================================
    // Devices
    // =========================================================================

    pub async fn attach_disk(
        &self,
        request: Request<AttachDiskRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.attach_disk(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn detach_disk(
        &self,
        request: Request<DetachDiskRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.detach_disk(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn resize_disk(
        &self,
        request: Request<ResizeDiskRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.resize_disk(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn attach_nic(
        &self,
        request: Request<AttachNicRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.attach_nic(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn detach_nic(
        &self,
        request: Request<DetachNicRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.detach_nic(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn attach_cdrom(
        &self,
        request: Request<AttachCdromRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.attach_cdrom(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn detach_cdrom(
        &self,
        request: Request<DetachCdromRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.detach_cdrom(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn mount_iso(
        &self,
        request: Request<MountIsoRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.mount_iso(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    pub async fn eject_iso(
        &self,
        request: Request<EjectIsoRequest>,
    ) -> Result<Response<VirtualMachine>, Status> {
        let vm = self.orchestrator.eject_iso(request.into_inner()).await?;
        Ok(Response::new(vm))
    }

    // =========================================================================
    // Console, agent health, events
    // =========================================================================

    pub async fn get_console(
        &self,
        request: Request<String>,
    ) -> Result<Response<ConsoleResponse>, Status> {
        let console = self.orchestrator.get_console(&request.into_inner()).await?;
        Ok(Response::new(console))
    }

    pub async fn ping_agent(
        &self,
        request: Request<String>,
    ) -> Result<Response<PingAgentResponse>, Status> {
        let health = self.orchestrator.ping_agent(&request.into_inner()).await?;
        Ok(Response::new(health))
    }

    pub async fn list_events(
        &self,
        request: Request<ListEventsRequest>,
    ) -> Result<Response<Vec<VmEvent>>, Status> {
        let events = self.orchestrator.list_events(request.into_inner()).await?;
        Ok(Response::new(events))
    }
}
