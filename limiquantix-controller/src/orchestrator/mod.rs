//! VM lifecycle orchestration.
//!
//! Every operation follows the same shape: validate, fetch a fresh record,
//! check the state guard, persist intent, dispatch to the owning node
//! daemon, persist the outcome, and return a fresh read. Remote failures
//! after persisted intent revert the record (or, for create and clone,
//! roll it back entirely) before the error is surfaced.

mod clone;
mod console;
mod devices;
mod power;
mod snapshot;

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use limiquantix_common::{log_error, log_success, log_vm, log_warn, TimedOperation};
use limiquantix_domain::{EventType, Node, VirtualMachine, VmEvent, VmState, VmStatus};
use limiquantix_nodeclient::{normalize_agent_address, vm_definition, AgentPool, NodeAgent};

use crate::config::ControllerConfig;
use crate::enrichment::LiveStateEnricher;
use crate::error::{ControlPlaneError, Result};
use crate::events::EventRecorder;
use crate::placement::{PlacementResolver, Scheduler};
use crate::repository::{
    EventFilter, NodeRepository, SnapshotRepository, VmFilter, VmRepository,
};
use crate::requests::{
    CreateVmRequest, DeleteVmRequest, ListEventsRequest, ListVmsRequest, ListVmsResponse,
    UpdateVmRequest,
};
use crate::validation;

/// Coordinates repositories, placement and node agents for every VM
/// operation the control plane exposes.
pub struct Orchestrator {
    repo: Arc<dyn VmRepository>,
    nodes: Arc<dyn NodeRepository>,
    snapshot_mirror: Option<Arc<dyn SnapshotRepository>>,
    pool: Arc<AgentPool>,
    placement: PlacementResolver,
    enricher: LiveStateEnricher,
    events: EventRecorder,
    config: ControllerConfig,
}

impl Orchestrator {
    /// Create an orchestrator without a scheduler or snapshot mirror.
    pub fn new(
        repo: Arc<dyn VmRepository>,
        nodes: Arc<dyn NodeRepository>,
        pool: Arc<AgentPool>,
        config: ControllerConfig,
    ) -> Self {
        let placement = PlacementResolver::new(nodes.clone(), None);
        let enricher = LiveStateEnricher::new(pool.clone(), nodes.clone(), config.agent_port);
        let events = EventRecorder::new(repo.clone());
        Self {
            repo,
            nodes,
            snapshot_mirror: None,
            pool,
            placement,
            enricher,
            events,
            config,
        }
    }

    /// Plug in a scheduler for automatic placement.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.placement = PlacementResolver::new(self.nodes.clone(), Some(scheduler));
        self
    }

    /// Plug in a snapshot mirror.
    pub fn with_snapshot_mirror(mut self, mirror: Arc<dyn SnapshotRepository>) -> Self {
        self.snapshot_mirror = Some(mirror);
        self
    }

    // =========================================================================
    // Create / Get / List / Update / Delete
    // =========================================================================

    /// Create a VM: place it, persist the record, and provision it on the
    /// target node.
    ///
    /// Creation is atomic with the remote result: when the node agent
    /// cannot be reached or refuses the definition, the freshly persisted
    /// record is rolled back and the error surfaced.
    pub async fn create_vm(&self, req: CreateVmRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_create(&req))?;

        let project_id = self.resolve_project(&req.project_id);
        let target = self.placement.resolve(&req.node_id, &req.spec).await;

        let mut vm = VirtualMachine::new(req.name, project_id)
            .with_description(req.description)
            .with_labels(req.labels)
            .with_spec(req.spec);
        vm.created_by = req.created_by;
        vm.status.state = VmState::Stopped;
        vm.status.message = "VM created successfully".to_string();
        if let Some(node) = &target {
            vm.status.node_id = node.id.clone();
        }

        let created = self.repo.create(vm).await.map_err(ControlPlaneError::from)?;
        log_vm!("create", &created.id, "Record persisted in project {}", created.project_id);

        if let Some(node) = &target {
            if let Err(err) = self.provision_on_node(&created, node).await {
                self.rollback_create(&created.id).await;
                return Err(err);
            }
        }

        self.events
            .info(
                &created.id,
                EventType::Lifecycle,
                format!("VM {} created", created.name),
            )
            .await;

        if req.start_on_create {
            if let Err(e) = self.start_vm(&created.id).await {
                warn!(vm_id = %created.id, error = %e, "start_on_create failed; VM remains stopped");
            }
        }

        log_success!("vm", "VM {} created successfully", created.name);
        self.fetch(&created.id).await
    }

    /// Fetch a VM, overlaying live usage when it is running somewhere.
    pub async fn get_vm(&self, vm_id: &str) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let mut vm = self.fetch(vm_id).await?;
        if vm.status.state.is_running() && !vm.status.node_id.is_empty() {
            self.enricher.enrich_one(&mut vm).await;
        }
        Ok(vm)
    }

    /// Filtered, paginated listing with live usage for the running VMs on
    /// the page.
    pub async fn list_vms(&self, req: ListVmsRequest) -> Result<ListVmsResponse> {
        let limit = self.config.clamp_page_size(req.page_size);
        let filter = VmFilter {
            project_id: req.project_id,
            node_id: req.node_id,
            states: req.states,
            labels: req.labels,
        };

        let (mut vms, total) = self
            .repo
            .list(&filter, limit, req.page_token.as_deref())
            .await
            .map_err(ControlPlaneError::from)?;

        let next_page_token = if vms.len() == limit {
            vms.last().map(|vm| vm.id.clone())
        } else {
            None
        };

        self.enricher.enrich(&mut vms).await;

        Ok(ListVmsResponse {
            vms,
            total,
            next_page_token,
        })
    }

    /// Apply partial changes to description, labels and spec.
    ///
    /// CPU and memory changes require the VM to be powered off.
    pub async fn update_vm(&self, req: UpdateVmRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_update(&req))?;

        let mut vm = self.fetch(&req.vm_id).await?;
        if (req.cpu.is_some() || req.memory.is_some()) && vm.status.state.is_running() {
            return Err(ControlPlaneError::FailedPrecondition(
                "CPU and memory cannot be changed while the VM is running".to_string(),
            ));
        }

        if let Some(description) = req.description {
            vm.description = description;
        }
        if let Some(labels) = req.labels {
            vm.labels = labels;
        }
        if let Some(cpu) = req.cpu {
            vm.spec.cpu = cpu;
        }
        if let Some(memory) = req.memory {
            vm.spec.memory = memory;
        }
        if let Some(display) = req.display {
            vm.spec.display = Some(display);
        }
        if let Some(guest_os) = req.guest_os {
            vm.spec.guest_os = Some(guest_os);
        }
        if let Some(ha_policy) = req.ha_policy {
            vm.spec.ha_policy = Some(ha_policy);
        }
        vm.updated_at = Utc::now();

        let updated = self.repo.update(vm).await.map_err(ControlPlaneError::from)?;
        self.events
            .info(&updated.id, EventType::Config, "VM configuration updated")
            .await;
        Ok(updated)
    }

    /// Delete a VM, best-effort on the node side.
    pub async fn delete_vm(&self, req: DeleteVmRequest) -> Result<()> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let vm = self.fetch(&req.vm_id).await?;
        if vm.status.state.is_running() && !req.force {
            return Err(ControlPlaneError::FailedPrecondition(
                "VM is running; stop it first or pass force".to_string(),
            ));
        }

        if !req.remove_from_inventory_only {
            if let Some(node_id) = vm.node_id() {
                match self.agent_for_node(node_id).await {
                    Ok(agent) => {
                        if let Err(e) = agent.delete_vm(&vm.id, req.delete_volumes).await {
                            if e.is_domain_not_found() {
                                warn!(vm_id = %vm.id, "Domain already gone on hypervisor");
                            } else {
                                warn!(
                                    vm_id = %vm.id,
                                    node_id = %node_id,
                                    error = %e,
                                    "Node-side delete failed; removing record anyway"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        log_warn!(
                            "vm",
                            "Node agent on {node_id} unreachable; skipping node-side delete of {}: {e}",
                            vm.id
                        );
                    }
                }
            }
        }

        self.repo
            .delete(&vm.id)
            .await
            .map_err(ControlPlaneError::from)?;
        log_vm!("delete", &vm.id, "Record removed");
        self.events
            .info(&vm.id, EventType::Lifecycle, format!("VM {} deleted", vm.name))
            .await;
        Ok(())
    }

    /// Audit events for a VM, newest first.
    pub async fn list_events(&self, req: ListEventsRequest) -> Result<Vec<VmEvent>> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;

        let filter = EventFilter {
            event_type: req.event_type.as_deref().map(EventType::from),
            severity: req
                .severity
                .as_deref()
                .map(limiquantix_domain::EventSeverity::from),
            limit: Some(if req.limit == 0 { 100 } else { req.limit }),
            since: req.since,
        };
        self.repo
            .list_events(&req.vm_id, &filter)
            .await
            .map_err(ControlPlaneError::from)
    }

    // =========================================================================
    // Shared plumbing
    // =========================================================================

    /// Read a fresh record.
    pub(crate) async fn fetch(&self, vm_id: &str) -> Result<VirtualMachine> {
        self.repo.get(vm_id).await.map_err(ControlPlaneError::from)
    }

    /// The get-then-connect dance: cached client, or resolve the node's
    /// management address and dial it.
    pub(crate) async fn agent_for_node(&self, node_id: &str) -> Result<Arc<dyn NodeAgent>> {
        if let Some(client) = self.pool.get(node_id).await {
            return Ok(client);
        }

        let node = self.nodes.get(node_id).await.map_err(|e| {
            ControlPlaneError::Unavailable(format!("node {node_id} is not registered: {e}"))
        })?;
        let address = normalize_agent_address(&node.management_ip, self.config.agent_port);
        self.pool
            .connect(node_id, &address)
            .await
            .map_err(ControlPlaneError::from)
    }

    /// Persist a state transition against a freshly read record and return
    /// the updated view.
    pub(crate) async fn set_state(
        &self,
        vm_id: &str,
        state: VmState,
        message: impl Into<String>,
    ) -> Result<VirtualMachine> {
        let vm = self.fetch(vm_id).await?;
        let mut status = vm.status.clone();
        status.state = state;
        status.message = message.into();
        self.repo
            .update_status(vm_id, status)
            .await
            .map_err(ControlPlaneError::from)?;
        self.fetch(vm_id).await
    }

    /// Persist a full status against a record.
    pub(crate) async fn persist_status(&self, vm_id: &str, status: VmStatus) -> Result<()> {
        self.repo
            .update_status(vm_id, status)
            .await
            .map_err(ControlPlaneError::from)
    }

    /// Best-effort revert of persisted intent after a remote failure. The
    /// revert's own error is logged and dropped so the original failure
    /// reaches the caller.
    pub(crate) async fn revert_state(&self, vm_id: &str, state: VmState, message: String) {
        if let Err(e) = self.set_state(vm_id, state, message).await {
            log_error!("vm", e, "Failed to revert state of VM {} after remote error", vm_id);
        }
    }

    /// Provision a freshly persisted record on its target node.
    pub(crate) async fn provision_on_node(&self, vm: &VirtualMachine, node: &Node) -> Result<()> {
        let agent = self.agent_for_node(&node.id).await?;

        let timer = TimedOperation::new(format!("create_vm {} on {}", vm.name, node.hostname));
        match agent.create_vm(vm_definition(vm)).await {
            Ok(_) => {
                timer.success();
                log_vm!("provision", &vm.id, "Defined on node {}", node.hostname);
                Ok(())
            }
            Err(e) => {
                timer.failure(&e.to_string());
                Err(ControlPlaneError::Internal(format!(
                    "failed to create VM on node {}: {e}",
                    node.hostname
                )))
            }
        }
    }

    /// Best-effort removal of a record whose remote provisioning failed.
    pub(crate) async fn rollback_create(&self, vm_id: &str) {
        if let Err(e) = self.repo.delete(vm_id).await {
            warn!(vm_id = %vm_id, error = %e, "Rollback of created VM record failed");
        }
    }

    /// Persist a spec mutation and return the updated record.
    pub(crate) async fn persist_spec(&self, mut vm: VirtualMachine) -> Result<VirtualMachine> {
        vm.updated_at = Utc::now();
        self.repo.update(vm).await.map_err(ControlPlaneError::from)
    }

    /// Record an informational audit event.
    pub(crate) async fn record_event(&self, vm_id: &str, event_type: EventType, message: String) {
        self.events.info(vm_id, event_type, message).await;
    }

    /// Map empty or "default" project references to the system project.
    pub(crate) fn resolve_project(&self, project_id: &str) -> String {
        if project_id.is_empty() || project_id == "default" {
            self.config.default_project_id.clone()
        } else {
            project_id.to_string()
        }
    }

    pub(crate) fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub(crate) fn snapshot_mirror(&self) -> Option<&Arc<dyn SnapshotRepository>> {
        self.snapshot_mirror.as_ref()
    }

    pub(crate) fn node_repository(&self) -> &Arc<dyn NodeRepository> {
        &self.nodes
    }
}
