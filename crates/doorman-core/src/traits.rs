//! Capabilities the decision engine needs from the rest of the gateway.
//!
//! The engine must reach physical controllers and persist door state, but
//! the crates that own those concerns (`doorman-network`, `doorman-storage`)
//! sit above it in the dependency graph. Both capabilities are therefore
//! expressed here and handed to the engine at construction.
//!
//! Methods return `impl Future + Send` (RPITIT) so implementations can be
//! written as plain `async fn` while callers keep `Send` futures for
//! `tokio::spawn`.

use crate::types::{AccessCommand, Door, DoorId, DoorPatch};
use std::future::Future;

/// Sends a command to the controller of a physical door.
pub trait Dispatcher: Send + Sync {
    /// Deliver `command` to the live connection for `door_id`.
    ///
    /// Returns `false` when no connection is registered or the send fails.
    /// Never waits for the device to act on the command.
    fn dispatch(
        &self,
        door_id: &DoorId,
        command: AccessCommand,
    ) -> impl Future<Output = bool> + Send;
}

/// Persists a partial update of a door record.
pub trait DoorMutator: Send + Sync {
    /// Apply `patch` and return the updated record, or `None` if the door
    /// does not exist.
    fn update_door(
        &self,
        door_id: &DoorId,
        patch: DoorPatch,
    ) -> impl Future<Output = Option<Door>> + Send;
}
