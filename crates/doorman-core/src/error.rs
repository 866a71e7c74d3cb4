use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Decision path errors
    #[error("Device {0} not found")]
    NotFound(String),

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    // Wire errors
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Invalid door id: {0}")]
    InvalidDoorId(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

impl Error {
    /// Build an [`Error::Unauthorized`] from any displayable reason.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Text shown to the caller when this error turns an attempt into a
    /// denial.
    #[must_use]
    pub fn denial_message(&self) -> String {
        match self {
            Error::Unauthorized { reason } => reason.clone(),
            Error::DeviceUnavailable(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
