//! Shared vocabulary for the doorman access-control gateway.
//!
//! Every other crate in the workspace speaks in terms of the types defined
//! here: door records, commands, access events, and the two capability
//! traits ([`Dispatcher`] and [`DoorMutator`]) that let the decision engine
//! reach devices and storage without depending on either crate.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Dispatcher, DoorMutator};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
