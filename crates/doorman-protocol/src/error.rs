use thiserror::Error;

/// Reasons an inbound frame is rejected.
///
/// The `Display` texts are sent verbatim to the peer inside an `error`
/// frame, so they are part of the wire contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Missing message type")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Missing device_id or command")]
    MissingCommandFields,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Missing or invalid field: {0}")]
    InvalidField(&'static str),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

impl From<ProtocolError> for doorman_core::Error {
    fn from(err: ProtocolError) -> Self {
        doorman_core::Error::MalformedMessage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
