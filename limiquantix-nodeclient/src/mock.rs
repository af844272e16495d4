//! Mock node agent for testing and development.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::client::NodeAgent;
use crate::error::{AgentError, Result};
use crate::pool::AgentConnector;
use crate::types::*;

#[derive(Debug)]
struct MockDomain {
    definition: VmDefinition,
    state: VmPowerState,
}

/// Mock node agent.
///
/// Simulates a node daemon in memory. Useful for:
/// - Unit and integration testing of the orchestrator
/// - Development without a hypervisor host
///
/// Faults are scripted per operation name, answers can be canned per VM,
/// and every call is recorded for assertions.
#[derive(Debug)]
pub struct MockAgent {
    domains: RwLock<HashMap<String, MockDomain>>,
    snapshots: RwLock<HashMap<String, Vec<AgentSnapshot>>>,
    statuses: RwLock<HashMap<String, AgentVmStatus>>,
    failures: RwLock<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockAgent {
    /// Create a new mock agent with no domains.
    pub fn new() -> Self {
        debug!("Creating mock node agent");
        Self {
            domains: RwLock::new(HashMap::new()),
            snapshots: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Seed a domain as if it had been created earlier.
    pub fn insert_domain(&self, vm_id: &str, state: VmPowerState) {
        if let Ok(mut domains) = self.domains.write() {
            domains.insert(
                vm_id.to_string(),
                MockDomain {
                    definition: VmDefinition {
                        id: vm_id.to_string(),
                        ..Default::default()
                    },
                    state,
                },
            );
        }
    }

    /// Preset the answer `get_vm_status` returns for a VM.
    pub fn set_status(&self, vm_id: &str, status: AgentVmStatus) {
        if let Ok(mut statuses) = self.statuses.write() {
            statuses.insert(vm_id.to_string(), status);
        }
    }

    /// Script a failure for an operation (by method name). The message is
    /// classified exactly as a remote error would be.
    pub fn set_failure(&self, op: &str, message: &str) {
        if let Ok(mut failures) = self.failures.write() {
            failures.insert(op.to_string(), message.to_string());
        }
    }

    /// Clear a scripted failure.
    pub fn clear_failure(&self, op: &str) {
        if let Ok(mut failures) = self.failures.write() {
            failures.remove(op);
        }
    }

    /// Everything this agent has been asked to do, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Current state of a domain, if defined.
    pub fn domain_state(&self, vm_id: &str) -> Option<VmPowerState> {
        self.domains
            .read()
            .ok()
            .and_then(|d| d.get(vm_id).map(|domain| domain.state))
    }

    fn record(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.into());
        }
    }

    fn scripted_failure(&self, op: &str) -> Result<()> {
        let failures = self
            .failures
            .read()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        match failures.get(op) {
            Some(message) => Err(AgentError::from_remote(message.clone())),
            None => Ok(()),
        }
    }

    fn with_domain<T>(
        &self,
        vm_id: &str,
        f: impl FnOnce(&mut MockDomain) -> Result<T>,
    ) -> Result<T> {
        let mut domains = self
            .domains
            .write()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        let domain = domains
            .get_mut(vm_id)
            .ok_or_else(|| AgentError::DomainNotFound(format!("VM not found: {vm_id}")))?;
        f(domain)
    }
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeAgent for MockAgent {
    async fn create_vm(&self, definition: VmDefinition) -> Result<String> {
        self.record(format!("create_vm {}", definition.id));
        self.scripted_failure("create_vm")?;

        let vm_id = definition.id.clone();
        let mut domains = self
            .domains
            .write()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;

        if domains.contains_key(&vm_id) {
            return Err(AgentError::Operation(format!("VM {vm_id} already exists")));
        }

        domains.insert(
            vm_id.clone(),
            MockDomain {
                definition,
                state: VmPowerState::Stopped,
            },
        );

        info!(vm_id = %vm_id, "Mock VM defined");
        Ok(vm_id)
    }

    async fn delete_vm(&self, vm_id: &str, delete_volumes: bool) -> Result<()> {
        self.record(format!("delete_vm {vm_id} volumes={delete_volumes}"));
        self.scripted_failure("delete_vm")?;

        let mut domains = self
            .domains
            .write()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        if domains.remove(vm_id).is_none() {
            return Err(AgentError::DomainNotFound(format!("VM not found: {vm_id}")));
        }

        if let Ok(mut snapshots) = self.snapshots.write() {
            snapshots.remove(vm_id);
        }
        Ok(())
    }

    async fn start_vm(&self, vm_id: &str) -> Result<()> {
        self.record(format!("start_vm {vm_id}"));
        self.scripted_failure("start_vm")?;
        self.with_domain(vm_id, |domain| {
            domain.state = VmPowerState::Running;
            Ok(())
        })
    }

    async fn stop_vm(&self, vm_id: &str, timeout: Duration) -> Result<()> {
        self.record(format!("stop_vm {vm_id} timeout={}", timeout.as_secs()));
        self.scripted_failure("stop_vm")?;
        self.with_domain(vm_id, |domain| {
            domain.state = VmPowerState::Stopped;
            Ok(())
        })
    }

    async fn force_stop_vm(&self, vm_id: &str) -> Result<()> {
        self.record(format!("force_stop_vm {vm_id}"));
        self.scripted_failure("force_stop_vm")?;
        self.with_domain(vm_id, |domain| {
            domain.state = VmPowerState::Stopped;
            Ok(())
        })
    }

    async fn reboot_vm(&self, vm_id: &str) -> Result<()> {
        self.record(format!("reboot_vm {vm_id}"));
        self.scripted_failure("reboot_vm")?;
        self.with_domain(vm_id, |_| Ok(()))
    }

    async fn pause_vm(&self, vm_id: &str) -> Result<()> {
        self.record(format!("pause_vm {vm_id}"));
        self.scripted_failure("pause_vm")?;
        self.with_domain(vm_id, |domain| {
            if domain.state != VmPowerState::Running {
                return Err(AgentError::Operation("VM is not running".to_string()));
            }
            domain.state = VmPowerState::Paused;
            Ok(())
        })
    }

    async fn resume_vm(&self, vm_id: &str) -> Result<()> {
        self.record(format!("resume_vm {vm_id}"));
        self.scripted_failure("resume_vm")?;
        self.with_domain(vm_id, |domain| {
            if domain.state != VmPowerState::Paused {
                return Err(AgentError::Operation("VM is not paused".to_string()));
            }
            domain.state = VmPowerState::Running;
            Ok(())
        })
    }

    async fn get_vm_status(&self, vm_id: &str) -> Result<AgentVmStatus> {
        self.record(format!("get_vm_status {vm_id}"));
        self.scripted_failure("get_vm_status")?;

        if let Ok(statuses) = self.statuses.read() {
            if let Some(status) = statuses.get(vm_id) {
                return Ok(status.clone());
            }
        }

        self.with_domain(vm_id, |domain| {
            Ok(AgentVmStatus {
                vm_id: vm_id.to_string(),
                state: domain.state,
                resources: AgentResourceUsage {
                    cpu_percent: if domain.state == VmPowerState::Running {
                        15.5
                    } else {
                        0.0
                    },
                    memory_used_bytes: domain.definition.memory.size_mib * 1024 * 1024 / 2,
                    ..Default::default()
                },
                guest_agent: None,
                ip_addresses: Vec::new(),
            })
        })
    }

    async fn get_console(&self, vm_id: &str) -> Result<ConsoleEndpoint> {
        self.record(format!("get_console {vm_id}"));
        self.scripted_failure("get_console")?;
        self.with_domain(vm_id, |domain| {
            Ok(ConsoleEndpoint {
                console_type: "vnc".to_string(),
                host: "127.0.0.1".to_string(),
                port: domain
                    .definition
                    .display
                    .as_ref()
                    .map(|d| d.port as u16)
                    .filter(|p| *p != 0)
                    .unwrap_or(5901),
                password: None,
            })
        })
    }

    async fn ping_guest_agent(&self, vm_id: &str) -> Result<AgentHealth> {
        self.record(format!("ping_guest_agent {vm_id}"));
        self.scripted_failure("ping_guest_agent")?;
        self.with_domain(vm_id, |_| {
            Ok(AgentHealth {
                connected: true,
                version: "0.1.27".to_string(),
                uptime_seconds: 3600,
            })
        })
    }

    async fn create_snapshot(
        &self,
        vm_id: &str,
        name: &str,
        description: &str,
        quiesce: bool,
        disk_only: bool,
    ) -> Result<AgentSnapshot> {
        self.record(format!(
            "create_snapshot {vm_id} {name} quiesce={quiesce} disk_only={disk_only}"
        ));
        self.scripted_failure("create_snapshot")?;

        let state = self.with_domain(vm_id, |domain| Ok(domain.state))?;
        let snapshot = AgentSnapshot {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            parent_id: None,
            vm_state: state,
            memory_included: !disk_only,
            quiesced: quiesce,
            size_bytes: 0,
            created_at: Utc::now(),
        };

        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        snapshots
            .entry(vm_id.to_string())
            .or_default()
            .push(snapshot.clone());

        info!(vm_id = %vm_id, snapshot_id = %snapshot.id, "Mock snapshot created");
        Ok(snapshot)
    }

    async fn list_snapshots(&self, vm_id: &str) -> Result<Vec<AgentSnapshot>> {
        self.record(format!("list_snapshots {vm_id}"));
        self.scripted_failure("list_snapshots")?;
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        Ok(snapshots.get(vm_id).cloned().unwrap_or_default())
    }

    async fn revert_snapshot(&self, vm_id: &str, snapshot_id: &str) -> Result<()> {
        self.record(format!("revert_snapshot {vm_id} {snapshot_id}"));
        self.scripted_failure("revert_snapshot")?;

        let state = {
            let snapshots = self
                .snapshots
                .read()
                .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
            snapshots
                .get(vm_id)
                .and_then(|list| list.iter().find(|s| s.id == snapshot_id))
                .map(|s| s.vm_state)
                .ok_or_else(|| {
                    AgentError::Operation(format!("snapshot {snapshot_id} does not exist"))
                })?
        };

        self.with_domain(vm_id, |domain| {
            domain.state = state;
            Ok(())
        })
    }

    async fn delete_snapshot(&self, vm_id: &str, snapshot_id: &str) -> Result<()> {
        self.record(format!("delete_snapshot {vm_id} {snapshot_id}"));
        self.scripted_failure("delete_snapshot")?;

        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        let list = snapshots
            .get_mut(vm_id)
            .ok_or_else(|| AgentError::Operation(format!("no snapshots for VM {vm_id}")))?;
        let idx = list
            .iter()
            .position(|s| s.id == snapshot_id)
            .ok_or_else(|| AgentError::Operation(format!("snapshot {snapshot_id} does not exist")))?;
        list.remove(idx);
        Ok(())
    }

    async fn attach_disk(&self, vm_id: &str, disk: AgentDisk) -> Result<()> {
        self.record(format!("attach_disk {vm_id} {}", disk.name));
        self.scripted_failure("attach_disk")?;
        self.with_domain(vm_id, |domain| {
            domain.definition.disks.push(disk);
            Ok(())
        })
    }

    async fn detach_disk(&self, vm_id: &str, disk_name: &str) -> Result<()> {
        self.record(format!("detach_disk {vm_id} {disk_name}"));
        self.scripted_failure("detach_disk")?;
        self.with_domain(vm_id, |domain| {
            domain.definition.disks.retain(|d| d.name != disk_name);
            Ok(())
        })
    }

    async fn resize_volume(
        &self,
        pool_id: &str,
        volume_id: &str,
        new_size_bytes: u64,
    ) -> Result<()> {
        self.record(format!("resize_volume {pool_id} {volume_id} {new_size_bytes}"));
        self.scripted_failure("resize_volume")?;
        Ok(())
    }

    async fn attach_nic(&self, vm_id: &str, nic: AgentNic) -> Result<()> {
        self.record(format!("attach_nic {vm_id} {}", nic.name));
        self.scripted_failure("attach_nic")?;
        self.with_domain(vm_id, |domain| {
            domain.definition.nics.push(nic);
            Ok(())
        })
    }

    async fn detach_nic(&self, vm_id: &str, nic_name: &str) -> Result<()> {
        self.record(format!("detach_nic {vm_id} {nic_name}"));
        self.scripted_failure("detach_nic")?;
        self.with_domain(vm_id, |domain| {
            domain.definition.nics.retain(|n| n.name != nic_name);
            Ok(())
        })
    }

    async fn change_media(&self, vm_id: &str, device: &str, iso_path: Option<&str>) -> Result<()> {
        self.record(format!(
            "change_media {vm_id} {device} {}",
            iso_path.unwrap_or("")
        ));
        self.scripted_failure("change_media")?;
        self.with_domain(vm_id, |_| Ok(()))
    }
}

// =============================================================================
// MOCK CONNECTOR
// =============================================================================

/// Connector handing out [`MockAgent`] clients.
///
/// Nodes can be marked unreachable to exercise channel-failure paths, and
/// every dial attempt is recorded with its target address. Unknown nodes
/// get a fresh agent on first connect.
pub struct MockConnector {
    agents: RwLock<HashMap<String, Arc<MockAgent>>>,
    unreachable: RwLock<HashSet<String>>,
    connections: Mutex<Vec<(String, String)>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            unreachable: RwLock::new(HashSet::new()),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Register the agent serving a node.
    pub fn register(&self, node_id: &str, agent: Arc<MockAgent>) {
        if let Ok(mut agents) = self.agents.write() {
            agents.insert(node_id.to_string(), agent);
        }
    }

    /// The agent registered for a node, if any.
    pub fn agent(&self, node_id: &str) -> Option<Arc<MockAgent>> {
        self.agents.read().ok().and_then(|a| a.get(node_id).cloned())
    }

    /// Make future dials to this node fail.
    pub fn set_unreachable(&self, node_id: &str) {
        if let Ok(mut unreachable) = self.unreachable.write() {
            unreachable.insert(node_id.to_string());
        }
    }

    /// Every `(node_id, address)` dial attempt so far.
    pub fn connections(&self) -> Vec<(String, String)> {
        self.connections.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentConnector for MockConnector {
    async fn connect(&self, node_id: &str, address: &str) -> Result<Arc<dyn NodeAgent>> {
        if let Ok(mut connections) = self.connections.lock() {
            connections.push((node_id.to_string(), address.to_string()));
        }

        let unreachable = self
            .unreachable
            .read()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        if unreachable.contains(node_id) {
            return Err(AgentError::ConnectFailed {
                node_id: node_id.to_string(),
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        drop(unreachable);

        let mut agents = self
            .agents
            .write()
            .map_err(|_| AgentError::Operation("lock poisoned".to_string()))?;
        let agent = agents
            .entry(node_id.to_string())
            .or_insert_with(|| Arc::new(MockAgent::new()))
            .clone();

        Ok(agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vm_lifecycle() {
        let agent = MockAgent::new();
        let vm_id = agent
            .create_vm(VmDefinition {
                id: "vm-1".to_string(),
                name: "lifecycle-test".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        agent.start_vm(&vm_id).await.unwrap();
        assert_eq!(agent.domain_state(&vm_id), Some(VmPowerState::Running));

        agent.pause_vm(&vm_id).await.unwrap();
        assert_eq!(agent.domain_state(&vm_id), Some(VmPowerState::Paused));

        agent.resume_vm(&vm_id).await.unwrap();
        agent.stop_vm(&vm_id, Duration::from_secs(30)).await.unwrap();
        assert_eq!(agent.domain_state(&vm_id), Some(VmPowerState::Stopped));

        agent.delete_vm(&vm_id, false).await.unwrap();
        assert!(agent.domain_state(&vm_id).is_none());
    }

    #[tokio::test]
    async fn test_scripted_failure_is_classified() {
        let agent = MockAgent::new();
        agent.insert_domain("vm-1", VmPowerState::Running);
        agent.set_failure("stop_vm", "error: nodomain");

        let err = agent
            .stop_vm("vm-1", Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(err.is_domain_not_found());

        agent.clear_failure("stop_vm");
        agent.stop_vm("vm-1", Duration::from_secs(30)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_domain_answers_not_found() {
        let agent = MockAgent::new();
        let err = agent.start_vm("ghost").await.unwrap_err();
        assert!(err.is_domain_not_found());
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let agent = MockAgent::new();
        agent.insert_domain("vm-1", VmPowerState::Running);
        agent
            .change_media("vm-1", "sdb", Some("/isos/tools.iso"))
            .await
            .unwrap();

        let calls = agent.calls();
        assert!(calls.contains(&"change_media vm-1 sdb /isos/tools.iso".to_string()));
    }

    #[tokio::test]
    async fn test_snapshot_tree() {
        let agent = MockAgent::new();
        agent.insert_domain("vm-1", VmPowerState::Running);

        let snapshot = agent
            .create_snapshot("vm-1", "snap1", "before upgrade", false, true)
            .await
            .unwrap();
        assert!(!snapshot.memory_included);

        let listed = agent.list_snapshots("vm-1").await.unwrap();
        assert_eq!(listed.len(), 1);

        agent.delete_snapshot("vm-1", &snapshot.id).await.unwrap();
        assert!(agent.list_snapshots("vm-1").await.unwrap().is_empty());
    }
}
