//! Frames exchanged with dashboard observers.

use crate::error::{ProtocolError, Result};
use crate::frame::{encode, parse_tagged, str_field};
use chrono::{DateTime, Utc};
use doorman_core::{AccessCommand, AccessEvent, AccessStatus, Door, DoorId};
use serde::{Deserialize, Serialize};

/// Request sent by an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverRequest {
    /// Run a command against a door. `device_id` is passed through as sent,
    /// so an id naming no door is answered like any unknown door. `user_id`
    /// is `None` when the observer did not identify the caller.
    Command {
        device_id: String,
        command: AccessCommand,
        user_id: Option<String>,
    },
    Ping,
}

impl ObserverRequest {
    /// Parse a text frame received from an observer.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidJson`] when the text is not a JSON object
    /// - [`ProtocolError::UnknownType`] for an unrecognised `"type"`
    /// - [`ProtocolError::MissingCommandFields`] when a command lacks
    ///   `device_id` or `command`
    /// - [`ProtocolError::InvalidCommand`] for an unknown command name
    ///
    /// # Examples
    ///
    /// ```
    /// use doorman_protocol::{ObserverRequest, ProtocolError};
    ///
    /// let req = ObserverRequest::parse(r#"{"type":"ping"}"#).unwrap();
    /// assert_eq!(req, ObserverRequest::Ping);
    ///
    /// let err = ObserverRequest::parse("not json").unwrap_err();
    /// assert_eq!(err, ProtocolError::InvalidJson);
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let (kind, object) = parse_tagged(text)?;

        match kind.as_str() {
            "command" => {
                let (Some(device_id), Some(command)) =
                    (str_field(&object, "device_id"), str_field(&object, "command"))
                else {
                    return Err(ProtocolError::MissingCommandFields);
                };
                let command = command
                    .parse()
                    .map_err(|_| ProtocolError::InvalidCommand(command.to_string()))?;
                let user_id = str_field(&object, "user_id").map(str::to_string);

                Ok(ObserverRequest::Command {
                    device_id: device_id.to_string(),
                    command,
                    user_id,
                })
            }
            "ping" => Ok(ObserverRequest::Ping),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// Full state of every door, sent once when an observer connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub devices: Vec<Door>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub device_id: DoorId,
    pub new_state: Door,
    pub timestamp: DateTime<Utc>,
}

/// Reply to an observer's own command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub device_id: String,
    pub command: AccessCommand,
    pub status: AccessStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub access_granted: bool,
}

/// Frame pushed to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverEvent {
    InitialData { data: Snapshot },
    DeviceStateChange { data: StateChange },
    AccessEvent { data: AccessEvent },
    CommandResponse { data: CommandResponse },
    Pong { timestamp: DateTime<Utc> },
    Error { message: String },
}

impl ObserverEvent {
    #[must_use]
    pub fn snapshot(devices: Vec<Door>) -> Self {
        ObserverEvent::InitialData {
            data: Snapshot {
                devices,
                timestamp: Utc::now(),
            },
        }
    }

    #[must_use]
    pub fn state_change(door: Door) -> Self {
        ObserverEvent::DeviceStateChange {
            data: StateChange {
                device_id: door.door_id.clone(),
                new_state: door,
                timestamp: Utc::now(),
            },
        }
    }

    #[must_use]
    pub fn pong() -> Self {
        ObserverEvent::Pong {
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        ObserverEvent::Error {
            message: message.into(),
        }
    }

    /// Serialize to the JSON text sent on the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        encode(self)
    }
}

impl From<AccessEvent> for ObserverEvent {
    fn from(event: AccessEvent) -> Self {
        ObserverEvent::AccessEvent { data: event }
    }
}

impl From<CommandResponse> for ObserverEvent {
    fn from(response: CommandResponse) -> Self {
        ObserverEvent::CommandResponse { data: response }
    }
}
