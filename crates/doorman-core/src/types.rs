use crate::{Result, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Door identifier (for example `DOOR-001`).
///
/// Identifiers are trimmed on construction and must be non-empty. They are
/// compared exactly; `door-001` and `DOOR-001` are different doors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoorId(String);

impl DoorId {
    /// Create a new door ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDoorId` if the trimmed ID is empty or contains
    /// whitespace or a path separator.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() || id.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(Error::InvalidDoorId(id.to_string()));
        }
        Ok(DoorId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DoorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DoorId::new(s)
    }
}

impl TryFrom<String> for DoorId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DoorId::new(&value)
    }
}

impl From<DoorId> for String {
    fn from(id: DoorId) -> Self {
        id.0
    }
}

/// Open/closed axis of a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalStatus {
    Open,
    Closed,
}

impl PhysicalStatus {
    #[inline]
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, PhysicalStatus::Open)
    }

    /// The command whose successful execution yields this status.
    #[inline]
    #[must_use]
    pub fn as_command(self) -> AccessCommand {
        match self {
            PhysicalStatus::Open => AccessCommand::Open,
            PhysicalStatus::Closed => AccessCommand::Close,
        }
    }
}

impl fmt::Display for PhysicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PhysicalStatus::Open => write!(f, "open"),
            PhysicalStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for PhysicalStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(PhysicalStatus::Open),
            "closed" => Ok(PhysicalStatus::Closed),
            _ => Err(Error::InvalidValue {
                field: "physical_status",
                value: s.to_string(),
            }),
        }
    }
}

/// Locked/unlocked axis of a door. Independent from [`PhysicalStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    #[inline]
    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, LockState::Locked)
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockState::Locked => write!(f, "locked"),
            LockState::Unlocked => write!(f, "unlocked"),
        }
    }
}

/// Whether a door is simulated in memory or backed by a remote controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Virtual,
    Physical,
}

impl DeviceType {
    #[inline]
    #[must_use]
    pub fn is_physical(self) -> bool {
        matches!(self, DeviceType::Physical)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeviceType::Virtual => write!(f, "virtual"),
            DeviceType::Physical => write!(f, "physical"),
        }
    }
}

/// Liveness of a physical controller. Virtual doors stay `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionStatus::Online => write!(f, "online"),
            ConnectionStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Command a caller may issue against a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessCommand {
    Open,
    Close,
    Lock,
    Unlock,
}

impl AccessCommand {
    /// All commands, in wire order.
    pub const ALL: [AccessCommand; 4] = [
        AccessCommand::Open,
        AccessCommand::Close,
        AccessCommand::Lock,
        AccessCommand::Unlock,
    ];

    /// Wire name of the command.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessCommand::Open => "open",
            AccessCommand::Close => "close",
            AccessCommand::Lock => "lock",
            AccessCommand::Unlock => "unlock",
        }
    }
}

impl fmt::Display for AccessCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessCommand {
    type Err = Error;

    /// Parse a command name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(AccessCommand::Open),
            "close" => Ok(AccessCommand::Close),
            "lock" => Ok(AccessCommand::Lock),
            "unlock" => Ok(AccessCommand::Unlock),
            _ => Err(Error::InvalidCommand(s.to_string())),
        }
    }
}

/// Outcome of an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Granted,
    Denied,
}

impl AccessStatus {
    #[inline]
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, AccessStatus::Granted)
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AccessStatus::Granted => write!(f, "granted"),
            AccessStatus::Denied => write!(f, "denied"),
        }
    }
}

/// A door record as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    pub door_id: DoorId,
    pub location: String,
    pub physical_status: PhysicalStatus,
    pub lock_state: LockState,
    pub device_type: DeviceType,
    pub connection_status: ConnectionStatus,
}

impl Door {
    /// A closed, unlocked, offline door of the given type.
    #[must_use]
    pub fn new(door_id: DoorId, location: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            door_id,
            location: location.into(),
            physical_status: PhysicalStatus::Closed,
            lock_state: LockState::Unlocked,
            device_type,
            connection_status: ConnectionStatus::Offline,
        }
    }

    #[must_use]
    pub fn with_physical_status(mut self, status: PhysicalStatus) -> Self {
        self.physical_status = status;
        self
    }

    #[must_use]
    pub fn with_lock_state(mut self, state: LockState) -> Self {
        self.lock_state = state;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_physical(&self) -> bool {
        self.device_type.is_physical()
    }

    #[inline]
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.connection_status == ConnectionStatus::Online
    }

    /// Apply a patch in place. Fields left `None` are untouched.
    pub fn apply(&mut self, patch: &DoorPatch) {
        if let Some(status) = patch.physical_status {
            self.physical_status = status;
        }
        if let Some(state) = patch.lock_state {
            self.lock_state = state;
        }
        if let Some(status) = patch.connection_status {
            self.connection_status = status;
        }
    }
}

/// Partial update of a [`Door`].
///
/// The constructors each touch exactly one axis, which is how the decision
/// engine guarantees it never flips open/closed and locked/unlocked in the
/// same step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoorPatch {
    pub physical_status: Option<PhysicalStatus>,
    pub lock_state: Option<LockState>,
    pub connection_status: Option<ConnectionStatus>,
}

impl DoorPatch {
    #[must_use]
    pub fn physical(status: PhysicalStatus) -> Self {
        Self {
            physical_status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn lock(state: LockState) -> Self {
        Self {
            lock_state: Some(state),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn connection(status: ConnectionStatus) -> Self {
        Self {
            connection_status: Some(status),
            ..Self::default()
        }
    }
}

/// Immutable record of one processed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub timestamp: DateTime<Utc>,
    pub device_id: DoorId,
    pub user_id: String,
    pub command: AccessCommand,
    pub status: AccessStatus,
    pub message: String,
}

impl AccessEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn now(
        device_id: DoorId,
        user_id: impl Into<String>,
        command: AccessCommand,
        status: AccessStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            device_id,
            user_id: user_id.into(),
            command,
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("DOOR-001", "DOOR-001")]
    #[case("  DOOR-002 ", "DOOR-002")]
    #[case("lab", "lab")]
    fn test_door_id_valid(#[case] input: &str, #[case] expected: &str) {
        let id = DoorId::new(input).unwrap();
        assert_eq!(id.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("DOOR 1")]
    #[case("a/b")]
    fn test_door_id_invalid(#[case] input: &str) {
        assert!(matches!(DoorId::new(input), Err(Error::InvalidDoorId(_))));
    }

    #[rstest]
    #[case("open", AccessCommand::Open)]
    #[case("CLOSE", AccessCommand::Close)]
    #[case(" Lock ", AccessCommand::Lock)]
    #[case("unlock", AccessCommand::Unlock)]
    fn test_command_parse(#[case] input: &str, #[case] expected: AccessCommand) {
        assert_eq!(input.parse::<AccessCommand>().unwrap(), expected);
    }

    #[test]
    fn test_command_parse_unknown() {
        let err = "explode".parse::<AccessCommand>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid command: explode");
    }

    #[test]
    fn test_door_serializes_lowercase() {
        let door = Door::new(DoorId::new("DOOR-001").unwrap(), "Main", DeviceType::Physical)
            .with_lock_state(LockState::Locked);
        let json = serde_json::to_value(&door).unwrap();

        assert_eq!(json["door_id"], "DOOR-001");
        assert_eq!(json["physical_status"], "closed");
        assert_eq!(json["lock_state"], "locked");
        assert_eq!(json["device_type"], "physical");
        assert_eq!(json["connection_status"], "offline");
    }

    #[test]
    fn test_door_id_rejects_empty_on_deserialize() {
        let result: std::result::Result<DoorId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_touches_single_axis() {
        let mut door = Door::new(DoorId::new("D").unwrap(), "x", DeviceType::Virtual);
        door.apply(&DoorPatch::physical(PhysicalStatus::Open));

        assert_eq!(door.physical_status, PhysicalStatus::Open);
        assert_eq!(door.lock_state, LockState::Unlocked);

        door.apply(&DoorPatch::lock(LockState::Locked));
        assert_eq!(door.physical_status, PhysicalStatus::Open);
        assert!(door.lock_state.is_locked());
    }

    #[test]
    fn test_physical_status_as_command() {
        assert_eq!(PhysicalStatus::Open.as_command(), AccessCommand::Open);
        assert_eq!(PhysicalStatus::Closed.as_command(), AccessCommand::Close);
        assert_eq!("OPEN".parse::<PhysicalStatus>().unwrap(), PhysicalStatus::Open);
        assert!("ajar".parse::<PhysicalStatus>().is_err());
    }
}
