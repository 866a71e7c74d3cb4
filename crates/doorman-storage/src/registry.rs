use crate::error::{StorageError, StorageResult};
use doorman_core::{Door, DoorId, DoorMutator, DoorPatch};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Keyed store of door records.
///
/// Doors are listed in id order. Records are never removed during a run.
#[derive(Debug, Default)]
pub struct DoorRegistry {
    doors: RwLock<BTreeMap<DoorId, Door>>,
}

impl DoorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a seed list. A later entry with the same id
    /// replaces an earlier one.
    #[must_use]
    pub fn with_doors(doors: impl IntoIterator<Item = Door>) -> Self {
        let doors = doors
            .into_iter()
            .map(|door| (door.door_id.clone(), door))
            .collect();
        Self {
            doors: RwLock::new(doors),
        }
    }

    /// Add a door that is not yet known.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::DuplicateDoor`] if the id is taken.
    pub async fn register(&self, door: Door) -> StorageResult<()> {
        let mut doors = self.doors.write().await;
        if doors.contains_key(&door.door_id) {
            return Err(StorageError::DuplicateDoor(door.door_id));
        }
        debug!(door_id = %door.door_id, device_type = %door.device_type, "Door registered");
        doors.insert(door.door_id.clone(), door);
        Ok(())
    }

    pub async fn get(&self, door_id: &DoorId) -> Option<Door> {
        self.doors.read().await.get(door_id).cloned()
    }

    pub async fn list(&self) -> Vec<Door> {
        self.doors.read().await.values().cloned().collect()
    }

    /// Apply `patch` to the stored record and return the result.
    pub async fn update(&self, door_id: &DoorId, patch: DoorPatch) -> Option<Door> {
        let mut doors = self.doors.write().await;
        let door = doors.get_mut(door_id)?;
        door.apply(&patch);
        Some(door.clone())
    }

    pub async fn len(&self) -> usize {
        self.doors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.doors.read().await.is_empty()
    }
}

impl DoorMutator for DoorRegistry {
    async fn update_door(&self, door_id: &DoorId, patch: DoorPatch) -> Option<Door> {
        self.update(door_id, patch).await
    }
}
