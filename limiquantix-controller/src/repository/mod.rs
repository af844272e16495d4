//! Storage contracts the orchestrator consumes.
//!
//! Production deployments bind these traits to their database; the
//! [`memory`] module backs development and the test suites. Uniqueness of
//! `(project_id, name)` and read-modify-write conflict detection are the
//! repository's responsibility, reported through [`RepositoryError`]
//! sentinels.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use limiquantix_domain::{
    EventSeverity, EventType, Node, Snapshot, VirtualMachine, VmEvent, VmState, VmStatus,
};

/// Errors a repository implementation reports.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// No record with the given id.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// A concurrent writer won the read-modify-write race.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// The backend itself failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Filter for VM listing.
#[derive(Debug, Clone, Default)]
pub struct VmFilter {
    /// Restrict to one project
    pub project_id: Option<String>,
    /// Restrict to VMs assigned to one node
    pub node_id: Option<String>,
    /// Restrict to a set of lifecycle states; empty matches all
    pub states: Vec<VmState>,
    /// Labels that must all be present with the given values
    pub labels: HashMap<String, String>,
}

impl VmFilter {
    /// Whether a record passes this filter.
    pub fn matches(&self, vm: &VirtualMachine) -> bool {
        if let Some(project_id) = &self.project_id {
            if &vm.project_id != project_id {
                return false;
            }
        }
        if let Some(node_id) = &self.node_id {
            if &vm.status.node_id != node_id {
                return false;
            }
        }
        if !self.states.is_empty() && !self.states.contains(&vm.status.state) {
            return false;
        }
        self.labels
            .iter()
            .all(|(key, value)| vm.labels.get(key) == Some(value))
    }
}

/// Filter for event listing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to one event category
    pub event_type: Option<EventType>,
    /// Restrict to one severity
    pub severity: Option<EventSeverity>,
    /// Maximum number of events to return; `None` means unbounded
    pub limit: Option<usize>,
    /// Only events at or after this instant
    pub since: Option<DateTime<Utc>>,
}

/// Persistence for VM records and their audit events.
#[async_trait]
pub trait VmRepository: Send + Sync {
    /// Insert a new record. Fails with [`RepositoryError::AlreadyExists`]
    /// when the `(project_id, name)` pair is taken.
    async fn create(&self, vm: VirtualMachine) -> Result<VirtualMachine>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> Result<VirtualMachine>;

    /// Filtered, cursor-paginated listing ordered by id.
    ///
    /// Returns the page and the total number of records matching the
    /// filter (ignoring pagination).
    async fn list(
        &self,
        filter: &VmFilter,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<(Vec<VirtualMachine>, usize)>;

    /// Replace a record.
    async fn update(&self, vm: VirtualMachine) -> Result<VirtualMachine>;

    /// Replace only the status of a record.
    async fn update_status(&self, id: &str, status: VmStatus) -> Result<()>;

    /// Remove a record.
    async fn delete(&self, id: &str) -> Result<()>;

    /// All records assigned to a node.
    async fn list_by_node(&self, node_id: &str) -> Result<Vec<VirtualMachine>>;

    /// Number of records in a project.
    async fn count_by_project(&self, project_id: &str) -> Result<usize>;

    /// Append an audit event.
    async fn create_event(&self, event: VmEvent) -> Result<()>;

    /// Events for a VM, newest first.
    async fn list_events(&self, vm_id: &str, filter: &EventFilter) -> Result<Vec<VmEvent>>;
}

/// Read access to the hypervisor node inventory.
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Fetch a node by id.
    async fn get(&self, node_id: &str) -> Result<Node>;

    /// All registered nodes.
    async fn list(&self) -> Result<Vec<Node>>;
}

/// Optional persistence for snapshot mirrors.
///
/// The hypervisor owns snapshot lifecycle; this mirror only speeds up
/// listings and survives agent restarts. Every write here is best-effort.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Insert or update a mirror record.
    async fn save(&self, snapshot: Snapshot) -> Result<()>;

    /// Remove a mirror record.
    async fn delete(&self, vm_id: &str, snapshot_id: &str) -> Result<()>;

    /// All mirror records for a VM.
    async fn list(&self, vm_id: &str) -> Result<Vec<Snapshot>>;

    /// Replace the mirror with the agent's authoritative view.
    async fn sync_from_hypervisor(&self, vm_id: &str, snapshots: Vec<Snapshot>) -> Result<()>;
}
