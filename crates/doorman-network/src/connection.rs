use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

/// Sending half of a connection: serialized frames for the peer.
pub type FrameSender = mpsc::UnboundedSender<String>;

/// Receiving half of a connection, drained by the transport.
pub type FrameReceiver = mpsc::UnboundedReceiver<String>;

/// Identity of one accepted connection.
///
/// A controller that reconnects gets a new id, which is how stale
/// disconnects from the superseded socket are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct DeviceConnection {
    pub(crate) id: ConnectionId,
    pub(crate) tx: FrameSender,
    /// Refreshed on every inbound frame.
    pub(crate) last_seen: Instant,
    pub(crate) connected_at: DateTime<Utc>,
}

impl DeviceConnection {
    pub(crate) fn new(tx: FrameSender) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
            last_seen: Instant::now(),
            connected_at: Utc::now(),
        }
    }
}
