//! Snapshot operations.
//!
//! The node daemon owns snapshot lifecycle; the control plane forwards
//! intent and keeps a best-effort mirror that it reconciles whenever it
//! lists the hypervisor's tree.

use tracing::warn;

use limiquantix_domain::{EventType, Snapshot, VirtualMachine};
use limiquantix_nodeclient::AgentSnapshot;

use crate::error::{ControlPlaneError, Result};
use crate::requests::{CreateSnapshotRequest, DeleteSnapshotRequest, RevertSnapshotRequest};
use crate::validation;

use super::Orchestrator;

fn snapshot_from_agent(vm_id: &str, agent_snapshot: &AgentSnapshot) -> Snapshot {
    Snapshot {
        id: agent_snapshot.id.clone(),
        vm_id: vm_id.to_string(),
        name: agent_snapshot.name.clone(),
        description: agent_snapshot.description.clone(),
        parent_id: agent_snapshot.parent_id.clone(),
        memory_included: agent_snapshot.memory_included,
        quiesced: agent_snapshot.quiesced,
        size_bytes: agent_snapshot.size_bytes,
        created_at: agent_snapshot.created_at,
    }
}

impl Orchestrator {
    /// Create a snapshot on the owning node.
    pub async fn create_snapshot(&self, req: CreateSnapshotRequest) -> Result<Snapshot> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        if req.name.is_empty() {
            return Err(ControlPlaneError::invalid_argument(
                "name",
                "must not be empty",
            ));
        }

        let vm = self.fetch(&req.vm_id).await?;
        let node_id = self.require_node(&vm)?;
        let agent = self.agent_for_node(node_id).await?;

        // The agent speaks disk_only; operators speak include_memory.
        let disk_only = !req.include_memory;
        let agent_snapshot = agent
            .create_snapshot(&vm.id, &req.name, &req.description, req.quiesce, disk_only)
            .await
            .map_err(|e| {
                ControlPlaneError::Internal(format!("failed to create snapshot: {e}"))
            })?;

        let snapshot = snapshot_from_agent(&vm.id, &agent_snapshot);
        if let Some(mirror) = self.snapshot_mirror() {
            if let Err(e) = mirror.save(snapshot.clone()).await {
                warn!(vm_id = %vm.id, snapshot_id = %snapshot.id, error = %e, "Snapshot mirror write failed");
            }
        }

        self.record_event(
            &vm.id,
            EventType::Snapshot,
            format!("Snapshot {} created", snapshot.name),
        )
        .await;
        Ok(snapshot)
    }

    /// List the hypervisor's snapshot tree, reconciling the mirror.
    ///
    /// A detached VM has no tree: the answer is empty.
    pub async fn list_snapshots(&self, vm_id: &str) -> Result<Vec<Snapshot>> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        let Some(node_id) = vm.node_id() else {
            return Ok(Vec::new());
        };

        let agent = self.agent_for_node(node_id).await?;
        let listed = agent.list_snapshots(&vm.id).await.map_err(|e| {
            ControlPlaneError::Internal(format!("failed to list snapshots: {e}"))
        })?;

        let snapshots: Vec<Snapshot> = listed
            .iter()
            .map(|agent_snapshot| snapshot_from_agent(&vm.id, agent_snapshot))
            .collect();

        if let Some(mirror) = self.snapshot_mirror() {
            if let Err(e) = mirror
                .sync_from_hypervisor(&vm.id, snapshots.clone())
                .await
            {
                warn!(vm_id = %vm.id, error = %e, "Snapshot mirror reconciliation failed");
            }
        }

        Ok(snapshots)
    }

    /// Revert a VM to a snapshot.
    ///
    /// A running VM is not blocked here: the node daemon rejects the revert
    /// itself when the snapshot is disk-only and the domain is live.
    pub async fn revert_to_snapshot(&self, req: RevertSnapshotRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        if req.snapshot_id.is_empty() {
            return Err(ControlPlaneError::invalid_argument(
                "snapshot_id",
                "must not be empty",
            ));
        }

        let vm = self.fetch(&req.vm_id).await?;
        let node_id = self.require_node(&vm)?;
        if vm.status.state.is_running() {
            warn!(
                vm_id = %vm.id,
                snapshot_id = %req.snapshot_id,
                "Reverting a running VM; the node daemon refuses disk-only snapshots while live"
            );
        }

        let agent = self.agent_for_node(node_id).await?;
        agent
            .revert_snapshot(&vm.id, &req.snapshot_id)
            .await
            .map_err(|e| {
                ControlPlaneError::Internal(format!("failed to revert snapshot: {e}"))
            })?;

        self.record_event(
            &vm.id,
            EventType::Snapshot,
            format!("VM reverted to snapshot {}", req.snapshot_id),
        )
        .await;

        if req.start_after_revert {
            if let Err(e) = self.start_vm(&vm.id).await {
                warn!(vm_id = %vm.id, error = %e, "start_after_revert failed");
            }
        }

        self.fetch(&vm.id).await
    }

    /// Delete a snapshot. The agent is authoritative; the mirror follows
    /// best-effort.
    pub async fn delete_snapshot(&self, req: DeleteSnapshotRequest) -> Result<()> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        if req.snapshot_id.is_empty() {
            return Err(ControlPlaneError::invalid_argument(
                "snapshot_id",
                "must not be empty",
            ));
        }

        let vm = self.fetch(&req.vm_id).await?;
        let node_id = self.require_node(&vm)?;
        let agent = self.agent_for_node(node_id).await?;

        agent
            .delete_snapshot(&vm.id, &req.snapshot_id)
            .await
            .map_err(|e| {
                ControlPlaneError::Internal(format!("failed to delete snapshot: {e}"))
            })?;

        if let Some(mirror) = self.snapshot_mirror() {
            if let Err(e) = mirror.delete(&vm.id, &req.snapshot_id).await {
                warn!(vm_id = %vm.id, snapshot_id = %req.snapshot_id, error = %e, "Snapshot mirror delete failed");
            }
        }

        self.record_event(
            &vm.id,
            EventType::Snapshot,
            format!("Snapshot {} deleted", req.snapshot_id),
        )
        .await;
        Ok(())
    }

    fn require_node<'a>(&self, vm: &'a VirtualMachine) -> Result<&'a str> {
        vm.node_id().ok_or_else(|| {
            ControlPlaneError::FailedPrecondition("VM is not assigned to a node".to_string())
        })
    }
}
