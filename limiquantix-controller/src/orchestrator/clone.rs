//! VM cloning.

use tracing::warn;

use limiquantix_common::log_vm;
use limiquantix_domain::{
    EventSeverity, EventType, VirtualMachine, VmEvent, VmState, LABEL_CLONED_FROM,
    LABEL_CLONE_TYPE,
};

use crate::error::{ControlPlaneError, Result};
use crate::requests::CloneVmRequest;
use crate::validation;

use super::Orchestrator;

impl Orchestrator {
    /// Clone a stopped VM onto the same node.
    ///
    /// The clone's disks reference the source volumes as backing files and
    /// get fresh volumes from the node daemon; for linked clones the
    /// copy-on-write relationship is permanent, for full clones the agent
    /// copies the data but the intent recorded here is identical. MAC
    /// addresses are cleared so the hypervisor assigns new ones.
    /// Atomicity matches create: remote failure rolls the record back.
    pub async fn clone_vm(&self, req: CloneVmRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.source_vm_id))?;
        validation::into_error(validation::validate_vm_name(&req.name))?;

        let source = self.fetch(&req.source_vm_id).await?;
        if source.status.state != VmState::Stopped {
            return Err(ControlPlaneError::FailedPrecondition(format!(
                "source VM must be stopped to clone (currently {})",
                source.status.state
            )));
        }

        let project_id = if req.project_id.is_empty() {
            source.project_id.clone()
        } else {
            self.resolve_project(&req.project_id)
        };

        let mut spec = source.spec.clone();
        for disk in &mut spec.disks {
            disk.backing_file = if disk.volume_id.is_empty() {
                None
            } else {
                Some(disk.volume_id.clone())
            };
            disk.volume_id = String::new();
        }
        for nic in &mut spec.nics {
            nic.mac_address = None;
        }

        let mut labels = source.labels.clone();
        labels.insert(LABEL_CLONED_FROM.to_string(), source.id.clone());
        labels.insert(
            LABEL_CLONE_TYPE.to_string(),
            req.clone_type.as_str().to_string(),
        );

        let mut vm = VirtualMachine::new(req.name, project_id)
            .with_description(source.description.clone())
            .with_labels(labels)
            .with_spec(spec);
        vm.status.state = VmState::Stopped;
        vm.status.message = "VM created successfully".to_string();
        vm.status.node_id = source.status.node_id.clone();

        let created = self.repo.create(vm).await.map_err(ControlPlaneError::from)?;
        log_vm!(
            "clone",
            &created.id,
            "Cloned from {} ({})",
            source.id,
            req.clone_type.as_str()
        );

        if let Some(node_id) = created.node_id().map(str::to_string) {
            let node = match self.node_repository().get(&node_id).await {
                Ok(node) => node,
                Err(e) => {
                    self.rollback_create(&created.id).await;
                    return Err(ControlPlaneError::Unavailable(format!(
                        "source node {node_id} is not registered: {e}"
                    )));
                }
            };
            if let Err(err) = self.provision_on_node(&created, &node).await {
                self.rollback_create(&created.id).await;
                return Err(err);
            }
        }

        self.events
            .record(
                VmEvent::new(
                    &created.id,
                    EventType::Lifecycle,
                    EventSeverity::Info,
                    format!("VM cloned from {}", source.id),
                )
                .with_metadata("source_vm_id", source.id.clone())
                .with_metadata("clone_type", req.clone_type.as_str()),
            )
            .await;

        if req.start_on_create {
            if let Err(e) = self.start_vm(&created.id).await {
                warn!(vm_id = %created.id, error = %e, "start_on_create after clone failed");
            }
        }

        self.fetch(&created.id).await
    }
}
