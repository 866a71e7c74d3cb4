use doorman_core::DoorId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Door already registered: {0}")]
    DuplicateDoor(DoorId),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
