//! Console access and guest agent liveness.

use tracing::warn;

use limiquantix_domain::VirtualMachine;
use limiquantix_nodeclient::normalize_agent_address;

use crate::error::{ControlPlaneError, Result};
use crate::requests::{ConsoleResponse, PingAgentResponse};
use crate::validation;

use super::Orchestrator;

impl Orchestrator {
    /// Console endpoint for a running VM.
    ///
    /// Degrades instead of failing: a detached VM gets the loopback
    /// default, and any agent failure falls back to an endpoint synthesised
    /// from the node address and the configured display.
    pub async fn get_console(&self, vm_id: &str) -> Result<ConsoleResponse> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.is_running() {
            return Err(ControlPlaneError::FailedPrecondition(
                "console requires a running VM".to_string(),
            ));
        }

        let Some(node_id) = vm.node_id() else {
            return Ok(ConsoleResponse {
                protocol: "vnc".to_string(),
                host: "127.0.0.1".to_string(),
                port: 5900,
                password: None,
            });
        };

        match self.agent_for_node(node_id).await {
            Ok(agent) => match agent.get_console(&vm.id).await {
                Ok(endpoint) => Ok(ConsoleResponse {
                    protocol: endpoint.console_type,
                    host: endpoint.host,
                    port: endpoint.port,
                    password: endpoint.password,
                }),
                Err(e) => {
                    warn!(vm_id = %vm.id, error = %e, "Console query failed; synthesising endpoint");
                    Ok(self.synthesised_console(&vm, node_id).await)
                }
            },
            Err(e) => {
                warn!(vm_id = %vm.id, error = %e, "Node agent unreachable; synthesising endpoint");
                Ok(self.synthesised_console(&vm, node_id).await)
            }
        }
    }

    /// Guest agent liveness. Never a hard failure: unreachable nodes and
    /// agent errors answer `connected: false`.
    pub async fn ping_agent(&self, vm_id: &str) -> Result<PingAgentResponse> {
        validation::into_error(validation::validate_vm_id(vm_id))?;

        let vm = self.fetch(vm_id).await?;
        if !vm.status.state.is_running() {
            return Err(ControlPlaneError::FailedPrecondition(
                "guest agent ping requires a running VM".to_string(),
            ));
        }
        let Some(node_id) = vm.node_id() else {
            return Err(ControlPlaneError::FailedPrecondition(
                "VM is not assigned to a node".to_string(),
            ));
        };

        let agent = match self.agent_for_node(node_id).await {
            Ok(agent) => agent,
            Err(e) => {
                return Ok(PingAgentResponse {
                    connected: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                })
            }
        };

        match agent.ping_guest_agent(&vm.id).await {
            Ok(health) => Ok(PingAgentResponse {
                connected: health.connected,
                version: health.version,
                uptime_seconds: health.uptime_seconds,
                error: None,
            }),
            Err(e) => Ok(PingAgentResponse {
                connected: false,
                error: Some(e.to_string()),
                ..Default::default()
            }),
        }
    }

    async fn synthesised_console(&self, vm: &VirtualMachine, node_id: &str) -> ConsoleResponse {
        let host = match self.node_repository().get(node_id).await {
            Ok(node) => {
                let address =
                    normalize_agent_address(&node.management_ip, self.config().agent_port);
                address
                    .split(':')
                    .next()
                    .unwrap_or("127.0.0.1")
                    .to_string()
            }
            Err(_) => "127.0.0.1".to_string(),
        };

        let display = vm.spec.display.as_ref();
        ConsoleResponse {
            protocol: display
                .map(|d| d.display_type.as_str().to_string())
                .unwrap_or_else(|| "vnc".to_string()),
            host,
            port: display.and_then(|d| d.port).unwrap_or(5900),
            password: display.and_then(|d| d.password.clone()),
        }
    }
}
