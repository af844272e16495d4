//! In-memory repository backends for development and testing.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use limiquantix_domain::{Node, Snapshot, VirtualMachine, VmEvent, VmStatus};

use super::{
    EventFilter, NodeRepository, RepositoryError, Result, SnapshotRepository, VmFilter,
    VmRepository,
};

fn poisoned() -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

// =============================================================================
// VM REPOSITORY
// =============================================================================

/// In-memory VM store.
///
/// Enforces the same contracts a database-backed repository would:
/// `(project_id, name)` uniqueness, id-ordered pagination, and an
/// append-only event log.
pub struct InMemoryRepository {
    vms: RwLock<HashMap<String, VirtualMachine>>,
    events: RwLock<Vec<VmEvent>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            vms: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VmRepository for InMemoryRepository {
    async fn create(&self, vm: VirtualMachine) -> Result<VirtualMachine> {
        let mut vms = self.vms.write().map_err(|_| poisoned())?;

        if vms.contains_key(&vm.id) {
            return Err(RepositoryError::AlreadyExists(vm.id.clone()));
        }
        if vms
            .values()
            .any(|existing| existing.project_id == vm.project_id && existing.name == vm.name)
        {
            return Err(RepositoryError::AlreadyExists(format!(
                "VM named {} already exists in project {}",
                vm.name, vm.project_id
            )));
        }

        vms.insert(vm.id.clone(), vm.clone());
        debug!(vm_id = %vm.id, name = %vm.name, "VM record created");
        Ok(vm)
    }

    async fn get(&self, id: &str) -> Result<VirtualMachine> {
        let vms = self.vms.read().map_err(|_| poisoned())?;
        vms.get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("VM {id}")))
    }

    async fn list(
        &self,
        filter: &VmFilter,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<VirtualMachine>, usize)> {
        let vms = self.vms.read().map_err(|_| poisoned())?;

        let mut matching: Vec<&VirtualMachine> =
            vms.values().filter(|vm| filter.matches(vm)).collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));

        let total = matching.len();
        let page = matching
            .into_iter()
            .filter(|vm| cursor.map_or(true, |c| vm.id.as_str() > c))
            .take(limit)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn update(&self, vm: VirtualMachine) -> Result<VirtualMachine> {
        let mut vms = self.vms.write().map_err(|_| poisoned())?;

        if !vms.contains_key(&vm.id) {
            return Err(RepositoryError::NotFound(format!("VM {}", vm.id)));
        }
        if vms.values().any(|existing| {
            existing.id != vm.id
                && existing.project_id == vm.project_id
                && existing.name == vm.name
        }) {
            return Err(RepositoryError::AlreadyExists(format!(
                "VM named {} already exists in project {}",
                vm.name, vm.project_id
            )));
        }

        vms.insert(vm.id.clone(), vm.clone());
        Ok(vm)
    }

    async fn update_status(&self, id: &str, status: VmStatus) -> Result<()> {
        let mut vms = self.vms.write().map_err(|_| poisoned())?;
        let vm = vms
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("VM {id}")))?;
        vm.status = status;
        vm.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut vms = self.vms.write().map_err(|_| poisoned())?;
        vms.remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("VM {id}")))
    }

    async fn list_by_node(&self, node_id: &str) -> Result<Vec<VirtualMachine>> {
        let vms = self.vms.read().map_err(|_| poisoned())?;
        Ok(vms
            .values()
            .filter(|vm| vm.status.node_id == node_id)
            .cloned()
            .collect())
    }

    async fn count_by_project(&self, project_id: &str) -> Result<usize> {
        let vms = self.vms.read().map_err(|_| poisoned())?;
        Ok(vms.values().filter(|vm| vm.project_id == project_id).count())
    }

    async fn create_event(&self, event: VmEvent) -> Result<()> {
        let mut events = self.events.write().map_err(|_| poisoned())?;
        events.push(event);
        Ok(())
    }

    async fn list_events(&self, vm_id: &str, filter: &EventFilter) -> Result<Vec<VmEvent>> {
        let events = self.events.read().map_err(|_| poisoned())?;
        let mut matching: Vec<VmEvent> = events
            .iter()
            .filter(|event| {
                event.vm_id == vm_id
                    && filter
                        .event_type
                        .map_or(true, |t| event.event_type == t)
                    && filter.severity.map_or(true, |s| event.severity == s)
                    && filter.since.map_or(true, |since| event.created_at >= since)
            })
            .cloned()
            .collect();

        // Newest first
        matching.reverse();
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }
}

// =============================================================================
// NODE REGISTRY
// =============================================================================

/// In-memory node inventory.
pub struct InMemoryNodeRegistry {
    nodes: RwLock<HashMap<String, Node>>,
}

impl InMemoryNodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a node.
    pub fn add(&self, node: Node) {
        if let Ok(mut nodes) = self.nodes.write() {
            nodes.insert(node.id.clone(), node);
        }
    }
}

impl Default for InMemoryNodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRegistry {
    async fn get(&self, node_id: &str) -> Result<Node> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("node {node_id}")))
    }

    async fn list(&self) -> Result<Vec<Node>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.values().cloned().collect())
    }
}

// =============================================================================
// SNAPSHOT MIRROR
// =============================================================================

/// In-memory snapshot mirror.
pub struct InMemorySnapshotRepository {
    snapshots: RwLock<HashMap<String, Vec<Snapshot>>>,
}

impl InMemorySnapshotRepository {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySnapshotRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        let list = snapshots.entry(snapshot.vm_id.clone()).or_default();
        list.retain(|s| s.id != snapshot.id);
        list.push(snapshot);
        Ok(())
    }

    async fn delete(&self, vm_id: &str, snapshot_id: &str) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        if let Some(list) = snapshots.get_mut(vm_id) {
            list.retain(|s| s.id != snapshot_id);
        }
        Ok(())
    }

    async fn list(&self, vm_id: &str) -> Result<Vec<Snapshot>> {
        let snapshots = self.snapshots.read().map_err(|_| poisoned())?;
        Ok(snapshots.get(vm_id).cloned().unwrap_or_default())
    }

    async fn sync_from_hypervisor(&self, vm_id: &str, incoming: Vec<Snapshot>) -> Result<()> {
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        // The agent view is authoritative, even when it is empty.
        snapshots.insert(vm_id.to_string(), incoming);
        Ok(())
    }
}
