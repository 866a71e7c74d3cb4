//! Messages attached to access decisions.
//!
//! These texts are returned to HTTP callers, echoed to observers in
//! `command_response` frames and stored in the access log.
//!
//! # Usage
//!
//! ```
//! use doorman_access::messages::DecisionMessages;
//!
//! assert_eq!(DecisionMessages::OPENED, "Door opened successfully");
//! ```

/// Decision messages, grouped by command.
pub struct DecisionMessages;

impl DecisionMessages {
    // Open
    pub const LOCKED_NOT_ADMIN: &'static str = "Door is locked and user is not admin";
    pub const ALREADY_OPEN: &'static str = "Door was already open";
    pub const OPENED: &'static str = "Door opened successfully";
    pub const OPEN_SENT: &'static str = "Open command sent to device";

    // Close
    pub const ALREADY_CLOSED: &'static str = "Door was already closed";
    pub const CLOSED: &'static str = "Door closed successfully";
    pub const CLOSE_SENT: &'static str = "Close command sent to device";

    // Lock
    pub const LOCK_NOT_ADMIN: &'static str = "Only admin users can lock doors";
    pub const ALREADY_LOCKED: &'static str = "Door was already locked";
    pub const LOCKED: &'static str = "Door locked successfully";

    // Unlock
    pub const UNLOCK_NOT_ADMIN: &'static str = "Only admin users can unlock doors";
    pub const ALREADY_UNLOCKED: &'static str = "Door was already unlocked";
    pub const UNLOCKED: &'static str = "Door unlocked successfully";

    /// Physical door whose controller is not connected.
    pub const DEVICE_NOT_CONNECTED: &'static str = "Device not connected";

    /// Button pressed on a controller whose door is locked.
    pub const BUTTON_DOOR_LOCKED: &'static str = "Door is locked";

    /// Status reported by a controller's sensor.
    pub const DEVICE_REPORTED_OPEN: &'static str = "Device reported door open";
    pub const DEVICE_REPORTED_CLOSED: &'static str = "Device reported door closed";

    /// Text for a command name that is not recognised.
    #[must_use]
    pub fn unknown_command(command: &str) -> String {
        format!("Unknown command: {command}")
    }
}
