//! Frames exchanged with physical door controllers.

use crate::error::{ProtocolError, Result};
use crate::frame::{command_field, encode, parse_tagged, str_field};
use chrono::{DateTime, Utc};
use doorman_core::{AccessCommand, PhysicalStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame received from a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReport {
    /// The sensor observed the door in `physical_status`.
    StatusUpdate { physical_status: PhysicalStatus },
    /// Someone pressed the controller's button.
    ButtonPress { command: AccessCommand },
    /// Outcome of a command previously sent to the controller.
    CommandResult {
        command: Option<String>,
        success: bool,
        message: String,
    },
    Ping,
    Pong,
}

impl DeviceReport {
    /// Parse a text frame received from a controller.
    ///
    /// Extra fields (controllers attach their own uptime `timestamp`) are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for malformed JSON, an unknown `"type"`,
    /// or a missing/invalid payload field.
    pub fn parse(text: &str) -> Result<Self> {
        let (kind, object) = parse_tagged(text)?;

        match kind.as_str() {
            "status_update" => {
                let status = object
                    .get("data")
                    .and_then(Value::as_object)
                    .and_then(|data| str_field(data, "physical_status"))
                    .ok_or(ProtocolError::InvalidField("physical_status"))?;
                let physical_status = status
                    .parse()
                    .map_err(|_| ProtocolError::InvalidField("physical_status"))?;
                Ok(DeviceReport::StatusUpdate { physical_status })
            }
            "button_command_request" => Ok(DeviceReport::ButtonPress {
                command: command_field(&object, "command")?,
            }),
            "command_response" => Ok(DeviceReport::CommandResult {
                command: str_field(&object, "command").map(str::to_string),
                success: object
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                message: str_field(&object, "message").unwrap_or_default().to_string(),
            }),
            "ping" => Ok(DeviceReport::Ping),
            "pong" => Ok(DeviceReport::Pong),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }
}

/// Frame sent to a controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceFrame {
    /// First frame on a new controller connection. The controller answers
    /// with a `status_update` carrying its sensor reading.
    Handshake { timestamp: DateTime<Utc> },
    Command { command: AccessCommand },
    CommandDenied { command: AccessCommand, reason: String },
    Ack { timestamp: DateTime<Utc> },
    Ping { timestamp: DateTime<Utc> },
    Pong { timestamp: DateTime<Utc> },
    Error { message: String },
}

impl DeviceFrame {
    #[must_use]
    pub fn handshake() -> Self {
        DeviceFrame::Handshake {
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn ack() -> Self {
        DeviceFrame::Ack {
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        DeviceFrame::Ping {
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn pong() -> Self {
        DeviceFrame::Pong {
            timestamp: Utc::now(),
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
