//! Snapshot mirror records.
//!
//! Snapshot lifecycle is hypervisor-owned; the control plane keeps a
//! best-effort mirror that is reconciled from the node daemon on list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A snapshot as mirrored by the control plane.
///
/// Snapshots form a tree per VM: `parent_id` references a snapshot of the
/// same VM or is empty for roots. The control plane never traverses the
/// tree; the node daemon is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier
    pub id: String,
    /// Owning VM
    pub vm_id: String,
    /// Snapshot name
    pub name: String,
    /// Description
    pub description: String,
    /// Parent snapshot in the chain, empty for roots
    pub parent_id: Option<String>,
    /// Whether guest memory was captured
    pub memory_included: bool,
    /// Whether guest filesystems were quiesced
    pub quiesced: bool,
    /// On-disk size, when known
    pub size_bytes: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
