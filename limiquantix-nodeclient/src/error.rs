//! Error types for node agent communication.

use thiserror::Error;

/// Substrings a libvirt-backed agent uses to report a missing domain.
///
/// Matching happens once, here, so callers test by type instead of
/// re-scanning message text.
const DOMAIN_NOT_FOUND_MARKERS: [&str; 4] =
    ["nodomain", "Domain not found", "VM not found", "not found"];

/// Errors that can occur while talking to a node agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The channel to the node daemon could not be established.
    #[error("failed to connect to node agent {node_id} at {address}: {reason}")]
    ConnectFailed {
        node_id: String,
        address: String,
        reason: String,
    },

    /// The hypervisor has no domain for the VM.
    #[error("domain not found on hypervisor: {0}")]
    DomainNotFound(String),

    /// The agent refused or failed the operation.
    #[error("agent operation failed: {0}")]
    Operation(String),

    /// The agent answered with something the client cannot interpret.
    #[error("invalid agent response: {0}")]
    InvalidResponse(String),
}

impl AgentError {
    /// Classify a remote error message.
    ///
    /// Missing-domain answers become [`AgentError::DomainNotFound`] so the
    /// orchestrator can reconcile stale records instead of failing.
    pub fn from_remote(message: impl Into<String>) -> Self {
        let message = message.into();
        if DOMAIN_NOT_FOUND_MARKERS.iter().any(|m| message.contains(m)) {
            AgentError::DomainNotFound(message)
        } else {
            AgentError::Operation(message)
        }
    }

    /// Whether this error means the domain is gone on the hypervisor.
    pub fn is_domain_not_found(&self) -> bool {
        matches!(self, AgentError::DomainNotFound(_))
    }

    /// Whether this error is a channel failure rather than a remote refusal.
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, AgentError::ConnectFailed { .. })
    }
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_domain_classification() {
        for message in [
            "error: nodomain",
            "Domain not found: vm-1",
            "VM not found: vm-1",
            "volume was not found",
        ] {
            assert!(
                AgentError::from_remote(message).is_domain_not_found(),
                "{message} should classify as missing domain"
            );
        }
    }

    #[test]
    fn test_real_errors_stay_operations() {
        let err = AgentError::from_remote("no storage pool");
        assert!(!err.is_domain_not_found());
        assert!(matches!(err, AgentError::Operation(_)));
    }

    #[test]
    fn test_connect_failure_context() {
        let err = AgentError::ConnectFailed {
            node_id: "node-x".to_string(),
            address: "192.168.0.53:9090".to_string(),
            reason: "connection refused".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("node-x"));
        assert!(text.contains("192.168.0.53:9090"));
    }
}
