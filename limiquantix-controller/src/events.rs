//! Append-only audit trail for VM mutations.

use std::sync::Arc;

use tracing::warn;

use crate::repository::VmRepository;
use limiquantix_domain::{EventSeverity, EventType, VmEvent};

/// Records audit events through the repository.
///
/// Event persistence never fails a mutation: failures are warned and
/// swallowed.
#[derive(Clone)]
pub struct EventRecorder {
    repo: Arc<dyn VmRepository>,
}

impl EventRecorder {
    pub fn new(repo: Arc<dyn VmRepository>) -> Self {
        Self { repo }
    }

    /// Persist an event, best-effort.
    pub async fn record(&self, event: VmEvent) {
        if let Err(e) = self.repo.create_event(event.clone()).await {
            warn!(
                vm_id = %event.vm_id,
                event_type = %event.event_type,
                error = %e,
                "Failed to record event"
            );
        }
    }

    /// Shorthand for an informational event.
    pub async fn info(&self, vm_id: &str, event_type: EventType, message: impl Into<String>) {
        self.record(VmEvent::new(vm_id, event_type, EventSeverity::Info, message))
            .await;
    }

    /// Shorthand for a warning event.
    pub async fn warn(&self, vm_id: &str, event_type: EventType, message: impl Into<String>) {
        self.record(VmEvent::new(vm_id, event_type, EventSeverity::Warn, message))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::InMemoryRepository;
    use crate::repository::EventFilter;

    #[tokio::test]
    async fn test_events_reach_the_log() {
        let repo = Arc::new(InMemoryRepository::new());
        let recorder = EventRecorder::new(repo.clone());

        recorder.info("vm-1", EventType::Disk, "disk attached").await;
        recorder.warn("vm-1", EventType::Snapshot, "mirror stale").await;

        let events = repo
            .list_events("vm-1", &EventFilter::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.id.starts_with("evt-")));
    }
}
