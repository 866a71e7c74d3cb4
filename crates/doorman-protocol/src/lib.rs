//! JSON frames exchanged over the gateway's WebSocket endpoints.
//!
//! Two audiences share the transport but never the vocabulary:
//!
//! ```text
//!   dashboard ──(ObserverRequest)──▶ gateway ──(ObserverEvent)──▶ dashboards
//!   controller ─(DeviceReport)─────▶ gateway ──(DeviceFrame)────▶ controller
//! ```
//!
//! Every frame is a JSON object whose `"type"` field selects the variant.
//! Outbound frames are plain serde enums. Inbound frames are parsed by hand
//! from a [`serde_json::Value`] so each failure maps onto the precise error
//! text the clients display.

pub mod device;
pub mod error;
mod frame;
pub mod observer;

pub use device::{DeviceFrame, DeviceReport};
pub use error::{ProtocolError, Result};
pub use observer::{CommandResponse, ObserverEvent, ObserverRequest, Snapshot, StateChange};
