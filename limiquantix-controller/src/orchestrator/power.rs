//! Power transitions: start, stop, reboot, pause/resume/suspend, and the
//! administrative state reset.

use tracing::{info, warn};

use limiquantix_common::log_vm;
use limiquantix_domain::{EventType, GuestAgentInfo, VirtualMachine, VmState};

use crate::error::{ControlPlaneError, Result};
use crate::requests::{ResetVmStateRequest, StopVmRequest};
use crate::validation;

use super::Orchestrator;

impl Orchestrator {
    /// Start a VM.
    ///
    /// Intent (`Starting`) is persisted before the node daemon is asked to
    /// boot the domain; any remote failure reverts the record to `Stopped`
    /// with a diagnostic. A VM without a node assignment transitions on
    /// paper only.
    pub async fn start_vm(&self, vm_id: &str) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.can_start() {
            return Err(ControlPlaneError::FailedPrecondition(format!(
                "VM cannot be started from state {}",
                vm.status.state
            )));
        }

        self.set_state(vm_id, VmState::Starting, "VM is starting").await?;

        match vm.node_id() {
            Some(node_id) => {
                let agent = match self.agent_for_node(node_id).await {
                    Ok(agent) => agent,
                    Err(e) => {
                        self.revert_state(
                            vm_id,
                            VmState::Stopped,
                            format!("failed to reach node agent: {e}"),
                        )
                        .await;
                        return Err(e);
                    }
                };
                if let Err(e) = agent.start_vm(vm_id).await {
                    self.revert_state(
                        vm_id,
                        VmState::Stopped,
                        format!("failed to start VM: {e}"),
                    )
                    .await;
                    return Err(ControlPlaneError::Internal(format!(
                        "failed to start VM: {e}"
                    )));
                }
            }
            None => {
                warn!(
                    vm_id = %vm_id,
                    "VM has no node assignment; start transitions the record only"
                );
            }
        }

        let vm = self.set_state(vm_id, VmState::Running, "VM is running").await?;
        log_vm!("start", vm_id, "VM is running");
        self.record_event(vm_id, EventType::Lifecycle, "VM started".to_string())
            .await;
        Ok(vm)
    }

    /// Stop a VM, gracefully unless forced.
    ///
    /// An agent answering "no such domain" means the record went stale: the
    /// stop is treated as already done and the record reconciled to
    /// `Stopped`.
    pub async fn stop_vm(&self, req: StopVmRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        let vm_id = req.vm_id.as_str();

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.can_stop() {
            return Err(ControlPlaneError::FailedPrecondition(format!(
                "VM cannot be stopped from state {}",
                vm.status.state
            )));
        }

        let intent = if req.force {
            "VM is stopping (forced)"
        } else {
            "VM is stopping"
        };
        self.set_state(vm_id, VmState::Stopping, intent).await?;

        let mut outcome = "VM is stopped".to_string();
        if let Some(node_id) = vm.node_id() {
            let agent = match self.agent_for_node(node_id).await {
                Ok(agent) => agent,
                Err(e) => {
                    self.revert_state(
                        vm_id,
                        VmState::Running,
                        format!("failed to reach node agent: {e}"),
                    )
                    .await;
                    return Err(e);
                }
            };

            let result = if req.force {
                agent.force_stop_vm(vm_id).await
            } else {
                agent.stop_vm(vm_id, self.config().stop_grace()).await
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_domain_not_found() => {
                    info!(
                        vm_id = %vm_id,
                        node_id = %node_id,
                        "Domain already gone on hypervisor; reconciling record"
                    );
                    outcome = "VM is stopped (domain was already gone on the hypervisor)"
                        .to_string();
                }
                Err(e) => {
                    self.revert_state(
                        vm_id,
                        VmState::Running,
                        format!("failed to stop VM: {e}"),
                    )
                    .await;
                    return Err(ControlPlaneError::Internal(format!(
                        "failed to stop VM: {e}"
                    )));
                }
            }
        }

        let vm = self.set_state(vm_id, VmState::Stopped, outcome).await?;
        log_vm!("stop", vm_id, "VM is stopped");
        self.record_event(vm_id, EventType::Lifecycle, "VM stopped".to_string())
            .await;
        Ok(vm)
    }

    /// Reboot a running VM. No intermediate state is persisted.
    pub async fn reboot_vm(&self, vm_id: &str) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.is_running() {
            return Err(ControlPlaneError::FailedPrecondition(
                "VM must be running to reboot".to_string(),
            ));
        }

        if let Some(node_id) = vm.node_id() {
            let agent = self.agent_for_node(node_id).await?;
            agent.reboot_vm(vm_id).await.map_err(|e| {
                ControlPlaneError::Internal(format!("failed to reboot VM: {e}"))
            })?;
        }

        let vm = self
            .set_state(vm_id, VmState::Running, "VM is rebooting")
            .await?;
        self.record_event(vm_id, EventType::Lifecycle, "VM rebooted".to_string())
            .await;
        Ok(vm)
    }

    /// Pause a running VM. The target state is persisted only after the
    /// node daemon confirms; failures leave the record running with a
    /// diagnostic message.
    pub async fn pause_vm(&self, vm_id: &str) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.is_running() {
            return Err(ControlPlaneError::FailedPrecondition(
                "VM must be running to pause".to_string(),
            ));
        }

        if let Some(node_id) = vm.node_id() {
            let agent = match self.agent_for_node(node_id).await {
                Ok(agent) => agent,
                Err(e) => {
                    self.revert_state(
                        vm_id,
                        VmState::Running,
                        format!("failed to reach node agent: {e}"),
                    )
                    .await;
                    return Err(e);
                }
            };
            if let Err(e) = agent.pause_vm(vm_id).await {
                self.revert_state(
                    vm_id,
                    VmState::Running,
                    format!("failed to pause VM: {e}"),
                )
                .await;
                return Err(ControlPlaneError::Internal(format!(
                    "failed to pause VM: {e}"
                )));
            }
        }

        let vm = self.set_state(vm_id, VmState::Paused, "VM is paused").await?;
        self.record_event(vm_id, EventType::Lifecycle, "VM paused".to_string())
            .await;
        Ok(vm)
    }

    /// Resume a paused VM.
    pub async fn resume_vm(&self, vm_id: &str) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if vm.status.state != VmState::Paused {
            return Err(ControlPlaneError::FailedPrecondition(
                "VM must be paused to resume".to_string(),
            ));
        }

        if let Some(node_id) = vm.node_id() {
            let agent = match self.agent_for_node(node_id).await {
                Ok(agent) => agent,
                Err(e) => {
                    self.revert_state(
                        vm_id,
                        VmState::Paused,
                        format!("failed to reach node agent: {e}"),
                    )
                    .await;
                    return Err(e);
                }
            };
            if let Err(e) = agent.resume_vm(vm_id).await {
                self.revert_state(
                    vm_id,
                    VmState::Paused,
                    format!("failed to resume VM: {e}"),
                )
                .await;
                return Err(ControlPlaneError::Internal(format!(
                    "failed to resume VM: {e}"
                )));
            }
        }

        let vm = self.set_state(vm_id, VmState::Running, "VM is running").await?;
        self.record_event(vm_id, EventType::Lifecycle, "VM resumed".to_string())
            .await;
        Ok(vm)
    }

    /// Suspend a running VM.
    ///
    /// Control-plane only: the record moves to `Suspended` without an
    /// agent call. A known asymmetry carried over from the node contract.
    pub async fn suspend_vm(&self, vm_id: &str) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.is_running() {
            return Err(ControlPlaneError::FailedPrecondition(
                "VM must be running to suspend".to_string(),
            ));
        }

        let vm = self
            .set_state(vm_id, VmState::Suspended, "VM is suspended")
            .await?;
        self.record_event(vm_id, EventType::Lifecycle, "VM suspended".to_string())
            .await;
        Ok(vm)
    }

    /// Reconcile a record stuck in a transient state.
    ///
    /// With a node assigned (and no force), the node daemon is asked what
    /// the domain is actually doing and the record follows its answer.
    /// Forcing pins the record to `Stopped` regardless.
    pub async fn reset_vm_state(&self, req: ResetVmStateRequest) -> Result<VirtualMachine> {
        validation::into_error(validation::validate_vm_id(&req.vm_id))?;
        let vm_id = req.vm_id.as_str();

        let vm = self.fetch(vm_id).await?;
        let previous = vm.status.state;

        if let (Some(node_id), false) = (vm.node_id(), req.force_to_stopped) {
            let agent = self.agent_for_node(node_id).await?;
            return match agent.get_vm_status(vm_id).await {
                Err(e) if e.is_domain_not_found() => {
                    let vm = self
                        .set_state(
                            vm_id,
                            VmState::Stopped,
                            format!(
                                "VM state reset to stopped: domain not found on hypervisor (was {previous})"
                            ),
                        )
                        .await?;
                    self.record_event(
                        vm_id,
                        EventType::Lifecycle,
                        "VM state reset: domain missing on hypervisor".to_string(),
                    )
                    .await;
                    Ok(vm)
                }
                Err(e) => Err(ControlPlaneError::Internal(format!(
                    "failed to query node agent: {e}"
                ))),
                Ok(agent_status) => {
                    let fresh = self.fetch(vm_id).await?;
                    let mut status = fresh.status.clone();
                    status.state = agent_status.state.to_domain_state();
                    status.message =
                        format!("VM state reconciled from node agent (was {previous})");

                    if !agent_status.ip_addresses.is_empty() {
                        status.ip_addresses = agent_status.ip_addresses.clone();
                    }
                    if let Some(guest) = &agent_status.guest_agent {
                        if guest.connected {
                            status.guest_agent = Some(GuestAgentInfo {
                                installed: true,
                                version: guest.version.clone(),
                                hostname: guest.hostname.clone(),
                                os: guest.os_name.clone(),
                                os_version: guest.os_version.clone(),
                                kernel: guest.kernel.clone(),
                                uptime_sec: guest.resources.uptime_sec,
                                ip_addresses: guest.ip_addresses.clone(),
                            });
                            if !guest.ip_addresses.is_empty() {
                                status.ip_addresses = guest.ip_addresses.clone();
                            }
                        }
                    }

                    self.persist_status(vm_id, status).await?;
                    self.record_event(
                        vm_id,
                        EventType::Lifecycle,
                        format!("VM state reconciled from node agent (was {previous})"),
                    )
                    .await;
                    self.fetch(vm_id).await
                }
            };
        }

        if req.force_to_stopped {
            let vm = self
                .set_state(
                    vm_id,
                    VmState::Stopped,
                    format!("VM state forcibly reset to stopped (was {previous})"),
                )
                .await?;
            self.record_event(
                vm_id,
                EventType::Lifecycle,
                format!("VM state forcibly reset to stopped (was {previous})"),
            )
            .await;
            return Ok(vm);
        }

        Err(ControlPlaneError::Unavailable(
            "VM has no node assigned; pass force_to_stopped=true to reset the record".to_string(),
        ))
    }
}
