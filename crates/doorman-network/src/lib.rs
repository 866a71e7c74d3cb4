//! Connection layer for the doorman gateway.
//!
//! This crate owns every live connection and is the only place frames are
//! pushed to peers.
//!
//! # Components
//!
//! - **ConnectionManager**: observer and device pools, command dispatch to
//!   a door's controller, broadcast fan-out to observers.
//! - **HeartbeatMonitor**: periodic liveness sweep for controllers, started
//!   explicitly by the process supervisor.
//!
//! Connections are represented by unbounded `mpsc` channels carrying
//! serialized JSON text. The transport layer owns the socket and forwards
//! whatever arrives on the receiver; a closed channel is a dead peer.
//!
//! # Example
//!
//! ```
//! use doorman_network::ConnectionManager;
//! use doorman_storage::DoorRegistry;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let manager = ConnectionManager::new(Arc::new(DoorRegistry::new()));
//! let (_id, mut frames) = manager.connect_observer().await;
//!
//! // The first frame is always the snapshot of every door.
//! let first = frames.recv().await.unwrap();
//! assert!(first.contains("initial_data"));
//! # }
//! ```

mod connection;
pub mod heartbeat;
mod manager;

pub use connection::{ConnectionId, FrameReceiver, FrameSender};
pub use heartbeat::{HeartbeatConfig, HeartbeatHandle, HeartbeatMonitor};
pub use manager::ConnectionManager;
