//! Hypervisor node record as read from the node inventory.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A hypervisor node.
///
/// The inventory is owned elsewhere; the control plane reads the hostname
/// for diagnostics and `management_ip` to reach the node daemon. The
/// management address may be bare, carry a CIDR suffix, or include a port.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id
    pub id: String,
    /// Node hostname
    pub hostname: String,
    /// Management address (host, host:port, or CIDR form)
    pub management_ip: String,
    /// Labels for selection/affinity
    pub labels: HashMap<String, String>,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        hostname: impl Into<String>,
        management_ip: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            management_ip: management_ip.into(),
            labels: HashMap::new(),
        }
    }
}
