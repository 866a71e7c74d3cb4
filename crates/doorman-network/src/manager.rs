use crate::connection::{ConnectionId, DeviceConnection, FrameReceiver, FrameSender};
use chrono::Utc;
use doorman_core::{
    AccessCommand, AccessEvent, ConnectionStatus, Dispatcher, Door, DoorId, DoorPatch,
};
use doorman_protocol::{DeviceFrame, ObserverEvent};
use doorman_storage::DoorRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Owner of every observer and device connection.
///
/// ```text
///                      ┌────────────────────────────┐
///   observers ◀────────┤ observers: id ─▶ sender     │
///   (broadcast)        │                            │
///                      │ devices: door ─▶ (id,      │
///   controllers ◀──────┤          sender, last_seen)│
///   (dispatch, ping)   └─────────────┬──────────────┘
///                                    │ connection_status
///                                    ▼
///                              DoorRegistry
/// ```
///
/// Locks on the pools are never held while another component is awaited,
/// except when admitting an observer (see [`connect_observer`]).
///
/// [`connect_observer`]: ConnectionManager::connect_observer
#[derive(Debug)]
pub struct ConnectionManager {
    registry: Arc<DoorRegistry>,
    observers: RwLock<HashMap<ConnectionId, FrameSender>>,
    devices: RwLock<HashMap<DoorId, DeviceConnection>>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(registry: Arc<DoorRegistry>) -> Self {
        Self {
            registry,
            observers: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DoorRegistry> {
        &self.registry
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Admit a new observer and queue the current snapshot of every door
    /// for it alone.
    ///
    /// The pool stays write-locked while the snapshot is taken, so a state
    /// change either lands in the snapshot or is broadcast to the new
    /// observer afterwards.
    pub async fn connect_observer(&self) -> (ConnectionId, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();

        let mut observers = self.observers.write().await;
        let snapshot = ObserverEvent::snapshot(self.registry.list().await);
        match snapshot.to_json() {
            Ok(json) => {
                let _ = tx.send(json);
            }
            Err(err) => warn!(connection_id = %id, error = %err, "Failed to encode snapshot"),
        }
        observers.insert(id, tx);

        info!(connection_id = %id, observers = observers.len(), "Observer connected");
        (id, rx)
    }

    /// Remove an observer. Returns `false` if it was already gone.
    pub async fn disconnect_observer(&self, id: ConnectionId) -> bool {
        let mut observers = self.observers.write().await;
        let removed = observers.remove(&id).is_some();
        if removed {
            info!(connection_id = %id, observers = observers.len(), "Observer disconnected");
        }
        removed
    }

    /// Queue `event` for a single observer.
    pub async fn send_to_observer(&self, id: ConnectionId, event: &ObserverEvent) -> bool {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(connection_id = %id, error = %err, "Failed to encode observer frame");
                return false;
            }
        };

        let sent = self
            .observers
            .read()
            .await
            .get(&id)
            .is_some_and(|tx| tx.send(json).is_ok());
        if !sent {
            self.disconnect_observer(id).await;
        }
        sent
    }

    /// Serialize `event` once and queue it for every observer.
    ///
    /// Observers whose channel is closed are dropped from the pool. Returns
    /// the number of observers reached.
    pub async fn broadcast(&self, event: &ObserverEvent) -> usize {
        let json = match event.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "Failed to encode broadcast frame");
                return 0;
            }
        };

        let (delivered, dead) = {
            let observers = self.observers.read().await;
            let mut dead = Vec::new();
            for (id, tx) in observers.iter() {
                if tx.send(json.clone()).is_err() {
                    dead.push(*id);
                }
            }
            (observers.len() - dead.len(), dead)
        };

        if !dead.is_empty() {
            let mut observers = self.observers.write().await;
            for id in &dead {
                observers.remove(id);
            }
            debug!(dropped = dead.len(), remaining = observers.len(), "Dropped dead observers");
        }

        delivered
    }

    pub async fn broadcast_state_change(&self, door: Door) -> usize {
        self.broadcast(&ObserverEvent::state_change(door)).await
    }

    pub async fn broadcast_access_event(&self, event: AccessEvent) -> usize {
        self.broadcast(&ObserverEvent::from(event)).await
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    // ========================================================================
    // Devices
    // ========================================================================

    /// Register the controller of `door_id`, superseding any previous
    /// connection for the same door, and mark the door online.
    ///
    /// The superseded connection's sender is dropped, which ends its
    /// receiver; its socket is left for the transport to close.
    pub async fn connect_device(&self, door_id: &DoorId) -> (ConnectionId, FrameReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = DeviceConnection::new(tx);
        let id = connection.id;

        let previous = self
            .devices
            .write()
            .await
            .insert(door_id.clone(), connection);

        match previous {
            Some(old) => info!(
                device_id = %door_id,
                connection_id = %id,
                superseded = %old.id,
                "Device reconnected, previous connection superseded"
            ),
            None => info!(device_id = %door_id, connection_id = %id, "Device connected"),
        }

        self.set_connection_status(door_id, ConnectionStatus::Online)
            .await;
        (id, rx)
    }

    /// Remove the controller connection of `door_id` if it is still `id`,
    /// and mark the door offline.
    ///
    /// Returns `false` when `id` is no longer the registered connection,
    /// which happens when a reconnect superseded it or the heartbeat
    /// already dropped it.
    pub async fn disconnect_device(&self, door_id: &DoorId, id: ConnectionId) -> bool {
        let removed = {
            let mut devices = self.devices.write().await;
            match devices.get(door_id) {
                Some(current) if current.id == id => devices.remove(door_id),
                _ => None,
            }
        };

        let Some(connection) = removed else {
            debug!(device_id = %door_id, connection_id = %id, "Ignoring stale device disconnect");
            return false;
        };

        info!(
            device_id = %door_id,
            connection_id = %id,
            uptime_secs = (Utc::now() - connection.connected_at).num_seconds(),
            "Device disconnected"
        );
        self.set_connection_status(door_id, ConnectionStatus::Offline)
            .await;
        true
    }

    /// Record that the controller sent a frame.
    pub async fn touch_device(&self, door_id: &DoorId, id: ConnectionId) {
        if let Some(connection) = self.devices.write().await.get_mut(door_id)
            && connection.id == id
        {
            connection.last_seen = Instant::now();
        }
    }

    /// Queue `frame` for the controller of `door_id`.
    ///
    /// A failed send means the connection is dead: it is disconnected and
    /// the door marked offline.
    pub async fn send_to_device(&self, door_id: &DoorId, frame: &DeviceFrame) -> bool {
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(err) => {
                warn!(device_id = %door_id, error = %err, "Failed to encode device frame");
                return false;
            }
        };

        let outcome = self
            .devices
            .read()
            .await
            .get(door_id)
            .map(|connection| (connection.id, connection.tx.send(json).is_ok()));

        match outcome {
            Some((_, true)) => true,
            Some((id, false)) => {
                warn!(device_id = %door_id, connection_id = %id, "Send to device failed");
                self.disconnect_device(door_id, id).await;
                false
            }
            None => false,
        }
    }

    pub async fn is_device_connected(&self, door_id: &DoorId) -> bool {
        self.devices.read().await.contains_key(door_id)
    }

    pub async fn connected_devices(&self) -> Vec<DoorId> {
        let mut ids: Vec<DoorId> = self.devices.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Liveness
    // ========================================================================

    /// Send a ping to every controller. Returns the number reached.
    pub async fn ping_devices(&self) -> usize {
        let mut reached = 0;
        for door_id in self.connected_devices().await {
            if self.send_to_device(&door_id, &DeviceFrame::ping()).await {
                reached += 1;
            }
        }
        reached
    }

    /// Disconnect every controller silent for longer than `timeout`.
    ///
    /// Returns the doors that went offline. A door appears at most once per
    /// transition because the connection is removed before the broadcast.
    pub async fn sweep_stale_devices(&self, timeout: Duration) -> Vec<DoorId> {
        let now = Instant::now();
        let stale: Vec<(DoorId, ConnectionId, Duration)> = self
            .devices
            .read()
            .await
            .iter()
            .filter_map(|(door_id, connection)| {
                let silence = now.saturating_duration_since(connection.last_seen);
                (silence > timeout).then(|| (door_id.clone(), connection.id, silence))
            })
            .collect();

        let mut offline = Vec::with_capacity(stale.len());
        for (door_id, id, silence) in stale {
            if self.disconnect_device(&door_id, id).await {
                warn!(
                    device_id = %door_id,
                    silent_secs = silence.as_secs(),
                    "Heartbeat timeout, device marked offline"
                );
                offline.push(door_id);
            }
        }
        offline
    }

    async fn set_connection_status(&self, door_id: &DoorId, status: ConnectionStatus) {
        match self
            .registry
            .update(door_id, DoorPatch::connection(status))
            .await
        {
            Some(door) => {
                self.broadcast_state_change(door).await;
            }
            None => warn!(device_id = %door_id, %status, "Connection status change for unknown door"),
        }
    }
}

impl Dispatcher for ConnectionManager {
    async fn dispatch(&self, door_id: &DoorId, command: AccessCommand) -> bool {
        let sent = self
            .send_to_device(door_id, &DeviceFrame::Command { command })
            .await;
        if sent {
            info!(device_id = %door_id, %command, "Command dispatched to device");
        } else {
            debug!(device_id = %door_id, %command, "Command not dispatched, device not connected");
        }
        sent
    }
}
