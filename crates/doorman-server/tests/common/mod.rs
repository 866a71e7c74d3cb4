//! Shared helpers for the gateway integration tests.
//!
//! Every test builds its own [`AppState`] from the default configuration,
//! which seeds two doors:
//!
//! - [`PHYSICAL_DOOR`]: physical, closed, locked
//! - [`VIRTUAL_DOOR`]: virtual, closed, unlocked

#![allow(dead_code)]

use doorman_core::DoorId;
use doorman_network::FrameReceiver;
use doorman_server::{AppState, ServerConfig, ServerError};
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const PHYSICAL_DOOR: &str = "DOOR-001";
pub const VIRTUAL_DOOR: &str = "DOOR-002";
pub const ADMIN: &str = "admin";
pub const GUEST: &str = "guest";

pub fn door(id: &str) -> DoorId {
    DoorId::new(id).unwrap()
}

pub fn build_state() -> AppState {
    AppState::from_config(&ServerConfig::default()).unwrap()
}

/// Every frame currently queued on `rx`, parsed as JSON.
pub fn drain(rx: &mut FrameReceiver) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(text) = rx.try_recv() {
        frames.push(serde_json::from_str(&text).unwrap());
    }
    frames
}

pub fn of_type<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
    frames.iter().filter(|f| f["type"] == kind).collect()
}

/// A running gateway bound to an ephemeral localhost port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = build_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(doorman_server::serve(listener, state.clone()));
        Self { addr, state, task }
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.state.shutdown.cancel();
        self.task.await.unwrap().unwrap();
    }
}
