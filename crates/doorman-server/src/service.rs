//! Command handling shared by every entry point.
//!
//! HTTP requests, observer frames and controller button presses all end in
//! [`AccessService::handle_command`], so a command has the same side
//! effects whatever its origin:
//!
//! ```text
//!   throttle.check ─deny──▶ DENIED (nothing recorded)
//!        │allow
//!   registry.get ───absent─▶ DENIED "Device .. not found" (nothing recorded)
//!        │
//!   engine.decide ──▶ throttle.record ──▶ log.append ──▶ broadcast access_event
//!                                                      └▶ broadcast device_state_change
//!                                                         (only when the door changed)
//! ```
//!
//! Controller status reports take a shorter path that skips the throttle
//! and the engine: the sensor states a fact, it does not ask permission.

use chrono::{DateTime, Utc};
use doorman_access::{AttemptThrottle, Decision, DecisionEngine, DecisionMessages, PairStatus, ThrottleStats};
use doorman_core::constants::{DEVICE_USER_ID, PHYSICAL_BUTTON_USER_ID};
use doorman_core::{
    AccessCommand, AccessEvent, AccessStatus, Door, DoorId, DoorPatch, Error, PhysicalStatus,
};
use doorman_network::{ConnectionId, ConnectionManager, FrameReceiver};
use doorman_protocol::{CommandResponse, DeviceFrame, DeviceReport, ObserverEvent, ObserverRequest};
use doorman_storage::{AccessLogStore, DoorRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a command, identical for every origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub access_granted: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub user_id: String,
    pub command: String,
    pub status: AccessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_device_state: Option<Door>,
    /// The command was forwarded to the door's controller.
    #[serde(skip)]
    pub dispatched: bool,
}

impl CommandOutcome {
    fn denied(device_id: &str, user_id: &str, command: &str, message: impl Into<String>) -> Self {
        Self {
            access_granted: false,
            message: message.into(),
            timestamp: Utc::now(),
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            command: command.to_string(),
            status: AccessStatus::Denied,
            updated_device_state: None,
            dispatched: false,
        }
    }

    fn not_found(device_id: &str, user_id: &str, command: &str) -> Self {
        let message = Error::NotFound(device_id.to_string()).to_string();
        Self::denied(device_id, user_id, command, message)
    }

    fn from_event(event: &AccessEvent, decision: Decision) -> Self {
        Self {
            access_granted: decision.is_granted(),
            message: decision.message,
            timestamp: event.timestamp,
            device_id: event.device_id.to_string(),
            user_id: event.user_id.clone(),
            command: event.command.to_string(),
            status: decision.status,
            updated_device_state: decision.door,
            dispatched: decision.dispatched,
        }
    }
}

/// The decision engine as wired in the gateway.
pub type Engine = DecisionEngine<ConnectionManager, DoorRegistry>;

/// Dispatch façade over the stores, the throttle, the engine and the
/// connection manager.
#[derive(Debug)]
pub struct AccessService {
    registry: Arc<DoorRegistry>,
    logs: Arc<AccessLogStore>,
    throttle: Arc<AttemptThrottle>,
    connections: Arc<ConnectionManager>,
    engine: Engine,
    admin_user_id: String,
}

impl AccessService {
    #[must_use]
    pub fn new(
        registry: Arc<DoorRegistry>,
        logs: Arc<AccessLogStore>,
        throttle: Arc<AttemptThrottle>,
        connections: Arc<ConnectionManager>,
        admin_user_id: impl Into<String>,
    ) -> Self {
        let admin_user_id = admin_user_id.into();
        let engine = DecisionEngine::new(admin_user_id.clone(), connections.clone(), registry.clone());
        Self {
            registry,
            logs,
            throttle,
            connections,
            engine,
            admin_user_id,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<DoorRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn logs(&self) -> &Arc<AccessLogStore> {
        &self.logs
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Run a command whose door id and name have not been parsed yet.
    ///
    /// An invalid door id is reported as not found and an unknown command
    /// name is denied; neither is recorded.
    pub async fn handle_raw_command(&self, device_id: &str, user_id: &str, command: &str) -> CommandOutcome {
        let Ok(door_id) = DoorId::new(device_id) else {
            return CommandOutcome::not_found(device_id, user_id, command);
        };
        match command.parse::<AccessCommand>() {
            Ok(parsed) => self.handle_command(&door_id, user_id, parsed).await,
            Err(_) => {
                debug!(device_id = %door_id, user_id, command, "Unknown command denied");
                CommandOutcome::denied(device_id, user_id, command, DecisionMessages::unknown_command(command))
            }
        }
    }

    /// Throttle, decide, record, log and broadcast one command.
    pub async fn handle_command(&self, door_id: &DoorId, user_id: &str, command: AccessCommand) -> CommandOutcome {
        let verdict = self.throttle.check(door_id, user_id, command).await;
        if !verdict.is_allowed() {
            let reason = verdict.reason();
            info!(device_id = %door_id, user_id, %command, reason = %reason, "Attempt throttled");
            return CommandOutcome::denied(door_id.as_str(), user_id, command.as_str(), reason);
        }

        let Some(door) = self.registry.get(door_id).await else {
            debug!(device_id = %door_id, user_id, %command, "Command for unknown door");
            return CommandOutcome::not_found(door_id.as_str(), user_id, command.as_str());
        };

        let decision = self.engine.decide(&door, user_id, command).await;
        self.throttle
            .record(door_id, user_id, command, decision.is_granted())
            .await;

        let event = AccessEvent::now(
            door_id.clone(),
            user_id,
            command,
            decision.status,
            decision.message.clone(),
        );
        info!(
            device_id = %door_id,
            user_id,
            %command,
            status = %decision.status,
            message = %decision.message,
            "Access attempt processed"
        );
        self.publish(&event, decision.door.clone()).await;

        CommandOutcome::from_event(&event, decision)
    }

    /// Answer an observer's text frame on its own connection.
    pub async fn handle_observer_frame(&self, observer: ConnectionId, text: &str) {
        let reply = match ObserverRequest::parse(text) {
            Ok(ObserverRequest::Ping) => ObserverEvent::pong(),
            Ok(ObserverRequest::Command {
                device_id,
                command,
                user_id,
            }) => {
                let user_id = user_id.unwrap_or_else(|| self.admin_user_id.clone());
                let outcome = match DoorId::new(&device_id) {
                    Ok(door_id) => self.handle_command(&door_id, &user_id, command).await,
                    Err(_) => CommandOutcome::not_found(&device_id, &user_id, command.as_str()),
                };
                ObserverEvent::from(CommandResponse {
                    device_id: outcome.device_id,
                    command,
                    status: outcome.status,
                    message: outcome.message,
                    timestamp: outcome.timestamp,
                    access_granted: outcome.access_granted,
                })
            }
            Err(err) => {
                debug!(connection_id = %observer, error = %err, "Malformed observer frame");
                ObserverEvent::error(err.to_string())
            }
        };
        self.connections.send_to_observer(observer, &reply).await;
    }

    // ========================================================================
    // Controllers
    // ========================================================================

    /// Validate that `device_id` names a physical door a controller may
    /// connect for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDoorId`], [`Error::NotFound`] or
    /// [`Error::InvalidValue`] for a virtual door.
    pub async fn admit_device(&self, device_id: &str) -> Result<DoorId, Error> {
        let door_id = DoorId::new(device_id)?;
        let door = self
            .registry
            .get(&door_id)
            .await
            .ok_or_else(|| Error::NotFound(door_id.to_string()))?;
        if !door.is_physical() {
            return Err(Error::InvalidValue {
                field: "device_type",
                value: door.device_type.to_string(),
            });
        }
        Ok(door_id)
    }

    /// Register the controller of an admitted door and greet it with a
    /// `handshake`, which prompts the controller to report its sensor.
    pub async fn attach_device(&self, door_id: &DoorId) -> (ConnectionId, FrameReceiver) {
        let (conn_id, rx) = self.connections.connect_device(door_id).await;
        self.connections
            .send_to_device(door_id, &DeviceFrame::handshake())
            .await;
        (conn_id, rx)
    }

    /// Handle a text frame from the controller of `door_id`.
    pub async fn handle_device_frame(&self, door_id: &DoorId, text: &str) {
        match DeviceReport::parse(text) {
            Ok(DeviceReport::StatusUpdate { physical_status }) => {
                if self.handle_device_status(door_id, physical_status).await.is_some() {
                    self.connections.send_to_device(door_id, &DeviceFrame::ack()).await;
                }
            }
            Ok(DeviceReport::ButtonPress { command }) => {
                self.handle_button_press(door_id, command).await;
            }
            Ok(DeviceReport::CommandResult {
                command,
                success,
                message,
            }) => {
                debug!(device_id = %door_id, command = ?command, success, message = %message, "Device command result");
            }
            Ok(DeviceReport::Ping) => {
                self.connections.send_to_device(door_id, &DeviceFrame::pong()).await;
            }
            Ok(DeviceReport::Pong) => {}
            Err(err) => {
                warn!(device_id = %door_id, error = %err, "Malformed device frame");
                self.connections
                    .send_to_device(door_id, &DeviceFrame::Error { message: err.to_string() })
                    .await;
            }
        }
    }

    /// Apply a sensor report. Returns the updated door, or `None` for an
    /// unknown door.
    pub async fn handle_device_status(&self, door_id: &DoorId, status: PhysicalStatus) -> Option<Door> {
        let door = self
            .registry
            .update(door_id, DoorPatch::physical(status))
            .await?;

        let message = match status {
            PhysicalStatus::Open => DecisionMessages::DEVICE_REPORTED_OPEN,
            PhysicalStatus::Closed => DecisionMessages::DEVICE_REPORTED_CLOSED,
        };
        let event = AccessEvent::now(
            door_id.clone(),
            DEVICE_USER_ID,
            status.as_command(),
            AccessStatus::Granted,
            message,
        );
        info!(device_id = %door_id, %status, "Device reported status");
        self.publish(&event, Some(door.clone())).await;
        Some(door)
    }

    /// Handle a button press on the controller of `door_id`.
    ///
    /// A locked door rejects the press without consulting the engine. Any
    /// denial is echoed to the controller as `command_denied`; a grant that
    /// was not forwarded as a command is acknowledged.
    pub async fn handle_button_press(&self, door_id: &DoorId, command: AccessCommand) -> CommandOutcome {
        let locked = self
            .registry
            .get(door_id)
            .await
            .is_some_and(|door| door.lock_state.is_locked());

        let outcome = if locked {
            let event = AccessEvent::now(
                door_id.clone(),
                PHYSICAL_BUTTON_USER_ID,
                command,
                AccessStatus::Denied,
                DecisionMessages::BUTTON_DOOR_LOCKED,
            );
            info!(device_id = %door_id, %command, "Button press rejected, door locked");
            self.publish(&event, None).await;
            CommandOutcome::from_event(&event, Decision::denied(DecisionMessages::BUTTON_DOOR_LOCKED))
        } else {
            self.handle_command(door_id, PHYSICAL_BUTTON_USER_ID, command).await
        };

        if !outcome.access_granted {
            let denied = DeviceFrame::CommandDenied {
                command,
                reason: outcome.message.clone(),
            };
            self.connections.send_to_device(door_id, &denied).await;
        } else if !outcome.dispatched {
            self.connections.send_to_device(door_id, &DeviceFrame::ack()).await;
        }
        outcome
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn doors(&self) -> Vec<Door> {
        self.registry.list().await
    }

    pub async fn access_logs(&self, limit: usize) -> Vec<AccessEvent> {
        self.logs.list(limit).await
    }

    pub async fn device_logs(&self, door_id: &DoorId, limit: usize) -> Vec<AccessEvent> {
        self.logs.list_by_device(door_id, limit).await
    }

    /// Empty the access log. Door records and the throttle ledger are
    /// left untouched.
    pub async fn clear_access_logs(&self) -> usize {
        let removed = self.logs.clear().await;
        info!(removed, "Access log cleared");
        removed
    }

    pub async fn throttle_stats(&self) -> ThrottleStats {
        self.throttle.stats().await
    }

    pub async fn throttle_status(&self, door_id: &DoorId, user_id: &str) -> PairStatus {
        self.throttle.status(door_id, user_id).await
    }

    /// Log `event` and broadcast it, followed by the door's new state when
    /// it changed.
    async fn publish(&self, event: &AccessEvent, changed: Option<Door>) {
        self.logs.append(event.clone()).await;
        self.connections.broadcast_access_event(event.clone()).await;
        if let Some(door) = changed {
            self.connections.broadcast_state_change(door).await;
        }
    }
}
