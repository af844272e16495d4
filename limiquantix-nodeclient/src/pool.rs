//! Connection pool for node agent clients.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::NodeAgent;
use crate::error::Result;

/// Well-known port the node daemon listens on.
pub const DEFAULT_AGENT_PORT: u16 = 9090;

/// Establishes new agent channels.
///
/// Implemented by the transport layer; the pool only caches what the
/// connector hands back.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// Open a channel to the agent at `address` for the given node.
    async fn connect(&self, node_id: &str, address: &str) -> Result<Arc<dyn NodeAgent>>;
}

/// Caches one live agent client per node.
///
/// `get` is cheap; `connect` dials through the [`AgentConnector`] and
/// atomically replaces whatever was cached for the node. Safe for
/// concurrent use from every request task.
pub struct AgentPool {
    connector: Arc<dyn AgentConnector>,
    clients: RwLock<HashMap<String, Arc<dyn NodeAgent>>>,
}

impl AgentPool {
    /// Create a pool dialing through the given connector.
    pub fn new(connector: Arc<dyn AgentConnector>) -> Self {
        Self {
            connector,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// The cached client for a node, if one is connected.
    pub async fn get(&self, node_id: &str) -> Option<Arc<dyn NodeAgent>> {
        self.clients.read().await.get(node_id).cloned()
    }

    /// Dial the agent and cache the client.
    pub async fn connect(&self, node_id: &str, address: &str) -> Result<Arc<dyn NodeAgent>> {
        debug!(node_id = %node_id, address = %address, "Connecting to node agent");
        let client = self.connector.connect(node_id, address).await?;

        let mut clients = self.clients.write().await;
        clients.insert(node_id.to_string(), client.clone());
        info!(node_id = %node_id, address = %address, "Node agent connected");

        Ok(client)
    }

    /// Drop the cached client for a node.
    pub async fn disconnect(&self, node_id: &str) {
        if self.clients.write().await.remove(node_id).is_some() {
            info!(node_id = %node_id, "Node agent disconnected");
        }
    }

    /// Ids of all nodes with a cached client.
    pub async fn connected_nodes(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }
}

/// Normalize a management address into a dialable agent endpoint.
///
/// Inventory records carry addresses as bare hosts, `host:port` pairs, or
/// CIDR entries like `192.168.0.53/32`. The CIDR suffix is stripped and the
/// well-known agent port appended when none is present.
pub fn normalize_agent_address(raw: &str, default_port: u16) -> String {
    let host = match raw.find('/') {
        Some(idx) => &raw[..idx],
        None => raw,
    };

    if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:{default_port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAgent, MockConnector};

    #[test]
    fn test_normalize_agent_address() {
        for raw in [
            "192.168.0.53/32",
            "192.168.0.53",
            "192.168.0.53:9090",
            "192.168.0.53/24",
        ] {
            assert_eq!(
                normalize_agent_address(raw, DEFAULT_AGENT_PORT),
                "192.168.0.53:9090",
                "normalizing {raw}"
            );
        }
    }

    #[test]
    fn test_normalize_keeps_custom_port() {
        assert_eq!(
            normalize_agent_address("10.0.0.7:7000", DEFAULT_AGENT_PORT),
            "10.0.0.7:7000"
        );
        assert_eq!(
            normalize_agent_address("10.0.0.7:7000/24", DEFAULT_AGENT_PORT),
            "10.0.0.7:7000"
        );
    }

    #[tokio::test]
    async fn test_pool_caches_connections() {
        let connector = Arc::new(MockConnector::new());
        connector.register("node-a", Arc::new(MockAgent::new()));

        let pool = AgentPool::new(connector);
        assert!(pool.get("node-a").await.is_none());

        pool.connect("node-a", "10.0.0.1:9090").await.unwrap();
        assert!(pool.get("node-a").await.is_some());
        assert_eq!(pool.connected_nodes().await, vec!["node-a".to_string()]);

        pool.disconnect("node-a").await;
        assert!(pool.get("node-a").await.is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_carries_node_and_address() {
        let connector = Arc::new(MockConnector::new());
        connector.set_unreachable("node-b");

        let pool = AgentPool::new(connector);
        let err = pool.connect("node-b", "10.0.0.2:9090").await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("node-b"));
        assert!(text.contains("10.0.0.2:9090"));
    }
}
