//! Append-only per-VM audit events.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Lifecycle,
    Snapshot,
    Disk,
    Network,
    Config,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Lifecycle => write!(f, "lifecycle"),
            EventType::Snapshot => write!(f, "snapshot"),
            EventType::Disk => write!(f, "disk"),
            EventType::Network => write!(f, "network"),
            EventType::Config => write!(f, "config"),
        }
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "snapshot" => EventType::Snapshot,
            "disk" | "storage" => EventType::Disk,
            "network" | "nic" => EventType::Network,
            "config" => EventType::Config,
            _ => EventType::Lifecycle,
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventSeverity::Info => write!(f, "info"),
            EventSeverity::Warn => write!(f, "warn"),
            EventSeverity::Error => write!(f, "error"),
        }
    }
}

impl From<&str> for EventSeverity {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "warn" | "warning" => EventSeverity::Warn,
            "error" => EventSeverity::Error,
            _ => EventSeverity::Info,
        }
    }
}

/// A single audit event for a VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmEvent {
    /// Unique event id (`evt-<unix-nano>`)
    pub id: String,
    /// Owning VM
    pub vm_id: String,
    /// Event category
    pub event_type: EventType,
    /// Severity
    pub severity: EventSeverity,
    /// Human-readable message
    pub message: String,
    /// Operator that triggered the action, when known
    pub user: String,
    /// Timestamp
    pub created_at: DateTime<Utc>,
    /// Structured context (JSON-serializable values)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VmEvent {
    /// Create a new event stamped with the current time.
    pub fn new(
        vm_id: impl Into<String>,
        event_type: EventType,
        severity: EventSeverity,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("evt-{}", now.timestamp_nanos_opt().unwrap_or_default()),
            vm_id: vm_id.into(),
            event_type,
            severity,
            message: message.into(),
            user: String::new(),
            created_at: now,
            metadata: HashMap::new(),
        }
    }

    /// Attach the acting operator.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_format() {
        let event = VmEvent::new("vm-1", EventType::Disk, EventSeverity::Info, "disk attached");
        assert!(event.id.starts_with("evt-"));
        assert!(event.id["evt-".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_metadata_values_are_structured() {
        let event = VmEvent::new("vm-1", EventType::Disk, EventSeverity::Info, "disk resized")
            .with_metadata("new_size_gib", 40u64)
            .with_metadata("disk", "disk-1");
        assert_eq!(
            event.metadata.get("new_size_gib"),
            Some(&serde_json::Value::from(40u64))
        );
        assert_eq!(
            event.metadata.get("disk"),
            Some(&serde_json::Value::from("disk-1"))
        );
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!(EventSeverity::from("warning"), EventSeverity::Warn);
        assert_eq!(EventSeverity::from("ERROR"), EventSeverity::Error);
        assert_eq!(EventSeverity::from("anything"), EventSeverity::Info);
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!(EventType::from("storage"), EventType::Disk);
        assert_eq!(EventType::from("nic"), EventType::Network);
        assert_eq!(EventType::from("boot"), EventType::Lifecycle);
    }
}
