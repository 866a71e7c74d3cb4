//! In-memory stores backing the gateway.
//!
//! - [`DoorRegistry`] holds the current record of every door and is the
//!   [`DoorMutator`](doorman_core::DoorMutator) handed to the decision
//!   engine.
//! - [`AccessLogStore`] is the ordered, append-only log of access events.
//!
//! Both are cheap to share behind an `Arc` and guard their collections with
//! `tokio::sync::RwLock`. Nothing is persisted across restarts.
//!
//! # Examples
//!
//! ```
//! use doorman_core::{DeviceType, Door, DoorId, DoorPatch, PhysicalStatus};
//! use doorman_storage::DoorRegistry;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DoorRegistry::new();
//! let id = DoorId::new("DOOR-002")?;
//! registry.register(Door::new(id.clone(), "Conference Room A", DeviceType::Virtual)).await?;
//!
//! let door = registry.update(&id, DoorPatch::physical(PhysicalStatus::Open)).await;
//! assert!(door.is_some_and(|d| d.physical_status.is_open()));
//! # Ok(())
//! # }
//! ```

pub mod access_log;
pub mod error;
pub mod registry;

pub use access_log::AccessLogStore;
pub use error::{StorageError, StorageResult};
pub use registry::DoorRegistry;
