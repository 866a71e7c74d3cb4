//! Integration tests for the heartbeat loop.
//!
//! Time is paused, so the runtime auto-advances to each heartbeat tick
//! while the test sleeps.

use doorman_core::{DeviceType, Door, DoorId};
use doorman_network::{ConnectionManager, FrameReceiver, HeartbeatConfig, HeartbeatMonitor};
use doorman_storage::DoorRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn door_id() -> DoorId {
    DoorId::new("DOOR-001").unwrap()
}

fn setup() -> Arc<ConnectionManager> {
    let registry = Arc::new(DoorRegistry::with_doors([Door::new(
        door_id(),
        "Main Entrance",
        DeviceType::Physical,
    )]));
    Arc::new(ConnectionManager::new(registry))
}

fn drain(rx: &mut FrameReceiver) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(text) = rx.try_recv() {
        frames.push(serde_json::from_str(&text).unwrap());
    }
    frames
}

fn connection_changes(frames: &[Value]) -> Vec<String> {
    frames
        .iter()
        .filter(|f| f["type"] == "device_state_change")
        .map(|f| f["data"]["new_state"]["connection_status"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_silent_device_goes_offline_exactly_once() {
    let manager = setup();
    let (_, mut observer) = manager.connect_observer().await;
    let (_, mut device) = manager.connect_device(&door_id()).await;

    let shutdown = CancellationToken::new();
    let handle = HeartbeatMonitor::new(manager.clone(), HeartbeatConfig::default()).start(shutdown.clone());

    // Ticks at 10s, 20s, 30s ping; the 40s tick finds 40s of silence.
    tokio::time::sleep(Duration::from_secs(45)).await;

    let pings: Vec<Value> = drain(&mut device);
    assert_eq!(pings.len(), 3);
    assert!(pings.iter().all(|f| f["type"] == "ping"));

    // Several more ticks must not repeat the transition.
    tokio::time::sleep(Duration::from_secs(60)).await;

    let frames = drain(&mut observer);
    assert_eq!(frames[0]["type"], "initial_data");
    assert_eq!(connection_changes(&frames), ["online", "offline"]);

    assert!(!manager.is_device_connected(&door_id()).await);
    assert!(device.recv().await.is_none());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_chatty_device_stays_online() {
    let manager = setup();
    let (conn, _device) = manager.connect_device(&door_id()).await;

    let handle = HeartbeatMonitor::new(manager.clone(), HeartbeatConfig::default())
        .start(CancellationToken::new());

    for _ in 0..10 {
        tokio::time::sleep(Duration::from_secs(15)).await;
        manager.touch_device(&door_id(), conn).await;
    }

    assert!(manager.is_device_connected(&door_id()).await);
    assert!(manager.registry().get(&door_id()).await.unwrap().is_online());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_parent_token_stops_monitor() {
    let manager = setup();
    let shutdown = CancellationToken::new();
    let handle = HeartbeatMonitor::new(manager, HeartbeatConfig::default()).start(shutdown.clone());
    assert!(handle.is_running());

    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(!handle.is_running());
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_tick_reports_offline_doors() {
    let manager = setup();
    let (_, _device) = manager.connect_device(&door_id()).await;
    let monitor = HeartbeatMonitor::new(
        manager.clone(),
        HeartbeatConfig {
            interval_secs: 5,
            timeout_secs: 10,
        },
    );

    assert!(monitor.tick().await.is_empty());
    tokio::time::advance(Duration::from_secs(11)).await;
    assert_eq!(monitor.tick().await, vec![door_id()]);
}
