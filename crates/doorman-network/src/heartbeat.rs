//! Controller liveness monitoring.
//!
//! WebSocket transports rarely notice a half-open connection on their own,
//! so the gateway runs a periodic sweep:
//!
//! ```text
//!   every interval:
//!     for each controller:
//!       silent > timeout ?  ──yes──▶ disconnect, mark offline, broadcast
//!                          ──no───▶ send ping
//! ```
//!
//! Any inbound frame refreshes a controller's `last_seen`, not only pongs.
//!
//! The monitor is started once by the process supervisor. [`HeartbeatMonitor::start`]
//! consumes the monitor, so a second loop cannot be started from the same
//! value, and the returned [`HeartbeatHandle`] stops it.

use crate::manager::ConnectionManager;
use doorman_core::DoorId;
use doorman_core::constants::{DEFAULT_HEARTBEAT_INTERVAL_SECS, DEFAULT_HEARTBEAT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Seconds between two sweeps.
    pub interval_secs: u64,
    /// Seconds of silence after which a controller is dropped.
    pub timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            timeout_secs: DEFAULT_HEARTBEAT_TIMEOUT_SECS,
        }
    }
}

impl HeartbeatConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Periodic liveness sweep over the controllers of a [`ConnectionManager`].
#[derive(Debug)]
pub struct HeartbeatMonitor {
    manager: Arc<ConnectionManager>,
    config: HeartbeatConfig,
}

impl HeartbeatMonitor {
    #[must_use]
    pub fn new(manager: Arc<ConnectionManager>, config: HeartbeatConfig) -> Self {
        Self { manager, config }
    }

    /// Run one sweep: drop silent controllers, then ping the rest.
    ///
    /// Returns the doors that went offline.
    pub async fn tick(&self) -> Vec<DoorId> {
        let offline = self.manager.sweep_stale_devices(self.config.timeout()).await;
        let pinged = self.manager.ping_devices().await;
        debug!(pinged, dropped = offline.len(), "Heartbeat sweep");
        offline
    }

    /// Spawn the sweep loop. It runs until `shutdown` is cancelled or the
    /// handle is shut down.
    pub fn start(self, shutdown: CancellationToken) -> HeartbeatHandle {
        let token = shutdown.child_token();
        let loop_token = token.clone();

        info!(
            interval_secs = self.config.interval().as_secs(),
            timeout_secs = self.config.timeout_secs,
            "Heartbeat monitor started"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }
            info!("Heartbeat monitor stopped");
        });

        HeartbeatHandle { token, task }
    }
}

/// Running heartbeat loop.
#[derive(Debug)]
pub struct HeartbeatHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to finish its current sweep.
    pub async fn shutdown(self) {
        self.token.cancel();
        match self.task.await {
            Ok(()) => {}
            Err(err) if err.is_panic() => error!(error = %err, "Heartbeat monitor panicked"),
            Err(err) => debug!(error = %err, "Heartbeat monitor cancelled"),
        }
    }
}
