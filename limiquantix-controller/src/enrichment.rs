//! Live-state enrichment of VM reads.
//!
//! Persisted records carry the last observed usage; at read time the
//! enricher overlays fresh metrics and guest agent data fetched from the
//! owning nodes. Everything here is best-effort: an unreachable node or a
//! failing VM query leaves the persisted values untouched and never fails
//! the read.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::repository::NodeRepository;
use limiquantix_domain::{GuestAgentInfo, VirtualMachine};
use limiquantix_nodeclient::{normalize_agent_address, AgentPool, AgentVmStatus, NodeAgent};

/// Fans metric fetches out across the nodes owning a set of VMs.
pub struct LiveStateEnricher {
    pool: Arc<AgentPool>,
    nodes: Arc<dyn NodeRepository>,
    agent_port: u16,
}

impl LiveStateEnricher {
    pub fn new(pool: Arc<AgentPool>, nodes: Arc<dyn NodeRepository>, agent_port: u16) -> Self {
        Self {
            pool,
            nodes,
            agent_port,
        }
    }

    /// Overlay live state onto every running, node-assigned VM in the set.
    ///
    /// Nodes are queried independently and in parallel; VMs on the same
    /// node share one client.
    pub async fn enrich(&self, vms: &mut [VirtualMachine]) {
        let mut by_node: HashMap<String, Vec<String>> = HashMap::new();
        for vm in vms.iter() {
            if vm.status.state.is_running() && !vm.status.node_id.is_empty() {
                by_node
                    .entry(vm.status.node_id.clone())
                    .or_default()
                    .push(vm.id.clone());
            }
        }
        if by_node.is_empty() {
            return;
        }

        let fetches = by_node.into_iter().map(|(node_id, vm_ids)| async move {
            let mut statuses: Vec<(String, AgentVmStatus)> = Vec::new();
            let Some(agent) = self.agent_for_node(&node_id).await else {
                debug!(node_id = %node_id, "Node agent unreachable; skipping live state");
                return statuses;
            };
            for vm_id in vm_ids {
                match agent.get_vm_status(&vm_id).await {
                    Ok(status) => statuses.push((vm_id, status)),
                    Err(e) => {
                        debug!(vm_id = %vm_id, node_id = %node_id, error = %e, "Live state fetch failed");
                    }
                }
            }
            statuses
        });

        let fetched: HashMap<String, AgentVmStatus> =
            join_all(fetches).await.into_iter().flatten().collect();

        for vm in vms.iter_mut() {
            if let Some(status) = fetched.get(&vm.id) {
                apply_live_status(vm, status);
            }
        }
    }

    /// Overlay live state onto a single VM.
    pub async fn enrich_one(&self, vm: &mut VirtualMachine) {
        self.enrich(std::slice::from_mut(vm)).await;
    }

    async fn agent_for_node(&self, node_id: &str) -> Option<Arc<dyn NodeAgent>> {
        if let Some(client) = self.pool.get(node_id).await {
            return Some(client);
        }

        let node = match self.nodes.get(node_id).await {
            Ok(node) => node,
            Err(e) => {
                debug!(node_id = %node_id, error = %e, "Node not in inventory");
                return None;
            }
        };

        let address = normalize_agent_address(&node.management_ip, self.agent_port);
        match self.pool.connect(node_id, &address).await {
            Ok(client) => Some(client),
            Err(e) => {
                debug!(node_id = %node_id, address = %address, error = %e, "Connect failed");
                None
            }
        }
    }
}

/// Fold an agent status report into the in-memory record.
fn apply_live_status(vm: &mut VirtualMachine, status: &AgentVmStatus) {
    let resources = &mut vm.status.resources;
    resources.cpu_percent = status.resources.cpu_percent;
    resources.memory_used_mib = status.resources.memory_used_bytes / (1024 * 1024);
    resources.disk_read_bps = status.resources.disk_read_bps;
    resources.disk_write_bps = status.resources.disk_write_bps;
    resources.net_rx_bps = status.resources.net_rx_bps;
    resources.net_tx_bps = status.resources.net_tx_bps;

    if let Some(guest) = &status.guest_agent {
        if guest.connected {
            vm.status.guest_agent = Some(GuestAgentInfo {
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
                vm.status.ip_addresses = guest.ip_addresses.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryNodeRegistry;
    use limiquantix_domain::{Node, VmState};
    use limiquantix_nodeclient::{
        AgentGuestInfo, AgentResourceUsage, GuestResourceUsage, MockAgent, MockConnector,
        VmPowerState, DEFAULT_AGENT_PORT,
    };

    fn running_vm(name: &str, node_id: &str) -> VirtualMachine {
        let mut vm = VirtualMachine::new(name, "p1");
        vm.status.state = VmState::Running;
        vm.status.node_id = node_id.to_string();
        vm
    }

    fn harness(nodes: &[&str]) -> (Arc<MockConnector>, LiveStateEnricher) {
        let connector = Arc::new(MockConnector::new());
        let registry = Arc::new(InMemoryNodeRegistry::new());
        for id in nodes {
            registry.add(Node::new(*id, format!("{id}.example"), "10.0.0.1"));
        }
        let pool = Arc::new(AgentPool::new(connector.clone()));
        let enricher = LiveStateEnricher::new(pool, registry, DEFAULT_AGENT_PORT);
        (connector, enricher)
    }

    #[tokio::test]
    async fn test_metrics_folded_into_running_vms() {
        let (connector, enricher) = harness(&["node-a"]);
        let agent = Arc::new(MockAgent::new());
        connector.register("node-a", agent.clone());

        let mut vm = running_vm("web", "node-a");
        agent.insert_domain(&vm.id, VmPowerState::Running);
        agent.set_status(
            &vm.id,
            AgentVmStatus {
                vm_id: vm.id.clone(),
                state: VmPowerState::Running,
                resources: AgentResourceUsage {
                    cpu_percent: 17.0,
                    memory_used_bytes: 512 * 1024 * 1024,
                    disk_read_bps: 1000,
                    disk_write_bps: 2000,
                    net_rx_bps: 300,
                    net_tx_bps: 400,
                },
                guest_agent: None,
                ip_addresses: Vec::new(),
            },
        );

        enricher.enrich_one(&mut vm).await;
        assert_eq!(vm.status.resources.cpu_percent, 17.0);
        assert_eq!(vm.status.resources.memory_used_mib, 512);
        assert_eq!(vm.status.resources.disk_write_bps, 2000);
    }

    #[tokio::test]
    async fn test_guest_agent_ips_override_status() {
        let (connector, enricher) = harness(&["node-a"]);
        let agent = Arc::new(MockAgent::new());
        connector.register("node-a", agent.clone());

        let mut vm = running_vm("web", "node-a");
        vm.status.ip_addresses = vec!["10.0.0.99".to_string()];
        agent.set_status(
            &vm.id,
            AgentVmStatus {
                vm_id: vm.id.clone(),
                state: VmPowerState::Running,
                guest_agent: Some(AgentGuestInfo {
                    connected: true,
                    version: "0.1.27".to_string(),
                    hostname: "web".to_string(),
                    os_name: "Debian GNU/Linux".to_string(),
                    os_version: "12".to_string(),
                    kernel: "6.1.0".to_string(),
                    ip_addresses: vec!["192.168.1.10".to_string()],
                    resources: GuestResourceUsage {
                        uptime_sec: 7200,
                        ..Default::default()
                    },
                }),
                ..Default::default()
            },
        );

        enricher.enrich_one(&mut vm).await;
        assert_eq!(vm.status.ip_addresses, vec!["192.168.1.10".to_string()]);
        let guest = vm.status.guest_agent.unwrap();
        assert!(guest.installed);
        assert_eq!(guest.uptime_sec, 7200);
    }

    #[tokio::test]
    async fn test_unreachable_node_leaves_persisted_values() {
        let (connector, enricher) = harness(&["node-b"]);
        connector.set_unreachable("node-b");

        let mut vm = running_vm("web", "node-b");
        vm.status.resources.cpu_percent = 3.5;

        enricher.enrich_one(&mut vm).await;
        assert_eq!(vm.status.resources.cpu_percent, 3.5);
    }

    #[tokio::test]
    async fn test_stopped_vms_are_skipped() {
        let (connector, enricher) = harness(&["node-a"]);
        let agent = Arc::new(MockAgent::new());
        connector.register("node-a", agent.clone());

        let mut vm = VirtualMachine::new("idle", "p1");
        vm.status.node_id = "node-a".to_string();

        enricher.enrich_one(&mut vm).await;
        assert!(agent.calls().is_empty());
    }
}
