//! Target node resolution for new VMs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::repository::NodeRepository;
use limiquantix_domain::{Node, VmSpec};

/// A scheduler's pick for a VM.
#[derive(Debug, Clone)]
pub struct Placement {
    pub node_id: String,
    pub hostname: String,
    pub score: f64,
}

/// Ranks nodes for a spec. The ranking algorithm is external; the
/// resolver only consumes its answer.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, spec: &VmSpec) -> anyhow::Result<Placement>;
}

/// Resolves the node a new VM lands on.
///
/// Explicit requests win when the node exists; otherwise the scheduler is
/// consulted when configured. Both paths degrade to "no node": the VM is
/// created detached and powered on later, once capacity exists.
pub struct PlacementResolver {
    nodes: Arc<dyn NodeRepository>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl PlacementResolver {
    pub fn new(nodes: Arc<dyn NodeRepository>, scheduler: Option<Arc<dyn Scheduler>>) -> Self {
        Self { nodes, scheduler }
    }

    /// Resolve the target node for a create or clone request.
    pub async fn resolve(&self, requested_node: &str, spec: &VmSpec) -> Option<Node> {
        if !requested_node.is_empty() {
            match self.nodes.get(requested_node).await {
                Ok(node) => {
                    info!(node_id = %node.id, hostname = %node.hostname, "Using requested node");
                    return Some(node);
                }
                Err(e) => {
                    warn!(
                        node_id = %requested_node,
                        error = %e,
                        "Requested node not registered; falling back to scheduler"
                    );
                }
            }
        }

        let scheduler = self.scheduler.as_ref()?;
        let placement = match scheduler.schedule(spec).await {
            Ok(placement) => placement,
            Err(e) => {
                warn!(error = %e, "Scheduler failed; creating VM without node assignment");
                return None;
            }
        };

        match self.nodes.get(&placement.node_id).await {
            Ok(node) => {
                info!(
                    node_id = %node.id,
                    hostname = %node.hostname,
                    score = placement.score,
                    "Scheduler placed VM"
                );
                Some(node)
            }
            Err(e) => {
                warn!(
                    node_id = %placement.node_id,
                    error = %e,
                    "Scheduled node vanished from inventory; creating VM without node assignment"
                );
                None
            }
        }
    }
}
