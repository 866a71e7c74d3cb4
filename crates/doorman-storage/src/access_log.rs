use doorman_core::{AccessEvent, DoorId};
use tokio::sync::RwLock;

/// Ordered, append-only log of access events.
///
/// Events are stored in arrival order; listings return the newest first.
#[derive(Debug, Default)]
pub struct AccessLogStore {
    events: RwLock<Vec<AccessEvent>>,
}

impl AccessLogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, event: AccessEvent) {
        self.events.write().await.push(event);
    }

    /// Up to `limit` events, newest first.
    pub async fn list(&self, limit: usize) -> Vec<AccessEvent> {
        self.events
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Up to `limit` events for one door, newest first.
    pub async fn list_by_device(&self, door_id: &DoorId, limit: usize) -> Vec<AccessEvent> {
        self.events
            .read()
            .await
            .iter()
            .rev()
            .filter(|event| &event.device_id == door_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Drop every event and return how many were removed.
    pub async fn clear(&self) -> usize {
        let mut events = self.events.write().await;
        let removed = events.len();
        events.clear();
        removed
    }
}
