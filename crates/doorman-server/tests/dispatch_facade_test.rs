//! Command handling through the façade, without any transport.
//!
//! Observers and controllers are attached straight to the connection
//! manager; their receivers stand in for sockets.

mod common;

use common::{ADMIN, GUEST, PHYSICAL_DOOR, VIRTUAL_DOOR, build_state, door, drain, of_type};
use doorman_access::DecisionMessages;
use doorman_core::constants::{DEVICE_USER_ID, PHYSICAL_BUTTON_USER_ID};
use doorman_core::{AccessCommand, AccessStatus, ConnectionStatus, Error, LockState, PhysicalStatus};
use rstest::rstest;

// ========================================
// Virtual doors
// ========================================

#[tokio::test]
async fn test_guest_cannot_open_locked_virtual_door() {
    let state = build_state();
    let service = &state.service;
    let id = door(VIRTUAL_DOOR);

    let locked = service.handle_command(&id, ADMIN, AccessCommand::Lock).await;
    assert!(locked.access_granted);
    assert_eq!(locked.message, DecisionMessages::LOCKED);

    let outcome = service.handle_command(&id, GUEST, AccessCommand::Open).await;
    assert!(!outcome.access_granted);
    assert_eq!(outcome.status, AccessStatus::Denied);
    assert_eq!(outcome.message, DecisionMessages::LOCKED_NOT_ADMIN);
    assert!(outcome.updated_device_state.is_none());

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.physical_status, PhysicalStatus::Closed);
    assert_eq!(stored.lock_state, LockState::Locked);

    let pair = service.throttle_status(&id, GUEST).await;
    assert_eq!(pair.failed_attempts_recent, 1);

    let logs = service.access_logs(10).await;
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].user_id, GUEST);
    assert_eq!(logs[0].status, AccessStatus::Denied);
}

#[tokio::test]
async fn test_open_virtual_door_mutates_and_broadcasts() {
    let state = build_state();
    let service = &state.service;
    let (_, mut observer) = state.connections().connect_observer().await;

    let outcome = service
        .handle_command(&door(VIRTUAL_DOOR), GUEST, AccessCommand::Open)
        .await;

    assert!(outcome.access_granted);
    assert_eq!(outcome.message, DecisionMessages::OPENED);
    let updated = outcome.updated_device_state.unwrap();
    assert_eq!(updated.physical_status, PhysicalStatus::Open);

    let frames = drain(&mut observer);
    assert_eq!(frames[0]["type"], "initial_data");
    assert_eq!(frames[1]["type"], "access_event");
    assert_eq!(frames[1]["data"]["status"], "granted");
    assert_eq!(frames[2]["type"], "device_state_change");
    assert_eq!(frames[2]["data"]["new_state"]["physical_status"], "open");
}

#[rstest]
#[case(AccessCommand::Close, DecisionMessages::ALREADY_CLOSED)]
#[case(AccessCommand::Unlock, DecisionMessages::ALREADY_UNLOCKED)]
#[tokio::test]
async fn test_idempotent_command_does_not_broadcast_state(
    #[case] command: AccessCommand,
    #[case] message: &str,
) {
    let state = build_state();
    let (_, mut observer) = state.connections().connect_observer().await;
    drain(&mut observer);

    let outcome = state
        .service
        .handle_command(&door(VIRTUAL_DOOR), ADMIN, command)
        .await;

    assert!(outcome.access_granted);
    assert_eq!(outcome.message, message);
    assert!(outcome.updated_device_state.is_none());

    let frames = drain(&mut observer);
    assert_eq!(of_type(&frames, "access_event").len(), 1);
    assert!(of_type(&frames, "device_state_change").is_empty());
}

#[rstest]
#[case(AccessCommand::Lock, DecisionMessages::LOCK_NOT_ADMIN)]
#[case(AccessCommand::Unlock, DecisionMessages::UNLOCK_NOT_ADMIN)]
#[tokio::test]
async fn test_lock_axis_requires_admin(#[case] command: AccessCommand, #[case] message: &str) {
    let state = build_state();

    for id in [PHYSICAL_DOOR, VIRTUAL_DOOR] {
        let outcome = state.service.handle_command(&door(id), GUEST, command).await;
        assert!(!outcome.access_granted, "{id}");
        assert_eq!(outcome.message, message);
    }
}

// ========================================
// Throttle
// ========================================

#[tokio::test]
async fn test_sixth_attempt_after_five_failures_is_locked_out() {
    let state = build_state();
    let service = &state.service;
    let id = door(VIRTUAL_DOOR);

    for _ in 0..5 {
        let outcome = service.handle_command(&id, GUEST, AccessCommand::Lock).await;
        assert_eq!(outcome.message, DecisionMessages::LOCK_NOT_ADMIN);
    }

    // Open would be granted by the engine; the throttle stops it first.
    let outcome = service.handle_command(&id, GUEST, AccessCommand::Open).await;
    assert!(!outcome.access_granted);
    assert!(outcome.message.starts_with("Too many failed attempts"), "{}", outcome.message);

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.physical_status, PhysicalStatus::Closed);

    // The rejected attempt is neither logged nor recorded.
    assert_eq!(service.access_logs(100).await.len(), 5);
    let pair = service.throttle_status(&id, GUEST).await;
    assert!(pair.is_locked_out);
    assert_eq!(pair.attempts_last_minute, 5);

    // Another caller is not affected.
    let other = service.handle_command(&id, "visitor", AccessCommand::Open).await;
    assert!(other.access_granted);
}

// ========================================
// Unknown doors and commands
// ========================================

#[tokio::test]
async fn test_unknown_door_records_nothing() {
    let state = build_state();
    let service = &state.service;

    let outcome = service.handle_raw_command("DOOR-404", ADMIN, "open").await;

    assert!(!outcome.access_granted);
    assert_eq!(outcome.message, Error::NotFound("DOOR-404".into()).to_string());
    assert!(service.access_logs(100).await.is_empty());
    assert_eq!(service.throttle_stats().await.total_records, 0);
}

#[rstest]
#[case("fly")]
#[case("")]
#[tokio::test]
async fn test_unknown_command_is_denied(#[case] command: &str) {
    let state = build_state();
    let service = &state.service;

    let outcome = service.handle_raw_command(VIRTUAL_DOOR, ADMIN, command).await;

    assert!(!outcome.access_granted);
    assert_eq!(outcome.message, DecisionMessages::unknown_command(command));
    assert!(service.access_logs(100).await.is_empty());
}

#[tokio::test]
async fn test_raw_command_name_is_case_insensitive() {
    let state = build_state();
    let outcome = state.service.handle_raw_command(VIRTUAL_DOOR, ADMIN, "LOCK").await;
    assert!(outcome.access_granted);
    assert_eq!(outcome.command, "lock");
}

// ========================================
// Physical doors
// ========================================

#[tokio::test]
async fn test_open_disconnected_physical_door_is_denied() {
    let state = build_state();
    let service = &state.service;
    let id = door(PHYSICAL_DOOR);

    let outcome = service.handle_command(&id, ADMIN, AccessCommand::Open).await;

    assert!(!outcome.access_granted);
    assert_eq!(outcome.message, DecisionMessages::DEVICE_NOT_CONNECTED);
    assert!(!outcome.dispatched);
    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.physical_status, PhysicalStatus::Closed);
    assert_eq!(service.throttle_status(&id, ADMIN).await.failed_attempts_recent, 1);
}

#[tokio::test]
async fn test_open_connected_physical_door_defers_to_device() {
    let state = build_state();
    let service = &state.service;
    let id = door(PHYSICAL_DOOR);
    let (_, mut observer) = state.connections().connect_observer().await;
    let (_, mut device) = state.connections().connect_device(&id).await;
    drain(&mut observer);

    let outcome = service.handle_command(&id, ADMIN, AccessCommand::Open).await;

    assert!(outcome.access_granted);
    assert!(outcome.dispatched);
    assert_eq!(outcome.message, DecisionMessages::OPEN_SENT);
    assert!(outcome.updated_device_state.is_none());
    assert_eq!(
        service.registry().get(&id).await.unwrap().physical_status,
        PhysicalStatus::Closed
    );

    let sent = drain(&mut device);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["type"], "command");
    assert_eq!(sent[0]["command"], "open");
    assert!(of_type(&drain(&mut observer), "device_state_change").is_empty());

    // The sensor report is what moves the door.
    service
        .handle_device_frame(&id, r#"{"type":"status_update","data":{"physical_status":"open"}}"#)
        .await;

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.physical_status, PhysicalStatus::Open);
    assert_eq!(stored.connection_status, ConnectionStatus::Online);

    let acks = drain(&mut device);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["type"], "ack");

    let frames = drain(&mut observer);
    assert_eq!(of_type(&frames, "device_state_change").len(), 1);
    let events = of_type(&frames, "access_event");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["data"]["user_id"], DEVICE_USER_ID);
    assert_eq!(events[0]["data"]["message"], DecisionMessages::DEVICE_REPORTED_OPEN);
}

#[tokio::test]
async fn test_reconnect_supersedes_previous_controller() {
    let state = build_state();
    let id = door(PHYSICAL_DOOR);
    let (old_conn, mut old) = state.connections().connect_device(&id).await;
    let (_, mut new) = state.connections().connect_device(&id).await;

    let outcome = state.service.handle_command(&id, ADMIN, AccessCommand::Open).await;
    assert!(outcome.dispatched);

    assert!(old.recv().await.is_none());
    assert_eq!(drain(&mut new).len(), 1);

    // The superseded socket closing must not take the door offline.
    assert!(!state.connections().disconnect_device(&id, old_conn).await);
    assert!(state.connections().is_device_connected(&id).await);
}

// ========================================
// Button presses
// ========================================

#[tokio::test]
async fn test_button_press_on_locked_door_is_rejected() {
    let state = build_state();
    let service = &state.service;
    let id = door(PHYSICAL_DOOR);
    let (_, mut device) = state.connections().connect_device(&id).await;

    service
        .handle_device_frame(&id, r#"{"type":"button_command_request","command":"open"}"#)
        .await;

    let frames = drain(&mut device);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "command_denied");
    assert_eq!(frames[0]["command"], "open");
    assert_eq!(frames[0]["reason"], DecisionMessages::BUTTON_DOOR_LOCKED);

    let logs = service.device_logs(&id, 10).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].user_id, PHYSICAL_BUTTON_USER_ID);
    assert_eq!(logs[0].status, AccessStatus::Denied);
    assert_eq!(service.throttle_stats().await.total_records, 0);
}

#[tokio::test]
async fn test_button_press_on_unlocked_door() {
    let state = build_state();
    let service = &state.service;
    let id = door(PHYSICAL_DOOR);
    let (_, mut device) = state.connections().connect_device(&id).await;
    service.handle_command(&id, ADMIN, AccessCommand::Unlock).await;

    // Forwarded: the controller gets the command itself.
    let outcome = service.handle_button_press(&id, AccessCommand::Open).await;
    assert!(outcome.dispatched);
    let frames = drain(&mut device);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "command");

    // Granted without a command: acknowledged.
    let outcome = service.handle_button_press(&id, AccessCommand::Close).await;
    assert!(outcome.access_granted);
    assert_eq!(outcome.message, DecisionMessages::ALREADY_CLOSED);
    let frames = drain(&mut device);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "ack");

    // Lock is refused to the button like to any non-admin.
    let outcome = service.handle_button_press(&id, AccessCommand::Lock).await;
    assert!(!outcome.access_granted);
    let frames = drain(&mut device);
    assert_eq!(frames[0]["type"], "command_denied");
    assert_eq!(frames[0]["reason"], DecisionMessages::LOCK_NOT_ADMIN);
}

// ========================================
// Frames
// ========================================

#[rstest]
#[case("not json", "Invalid JSON format")]
#[case(r#"{"type":"subscribe"}"#, "Unknown message type: subscribe")]
#[case(r#"{"type":"command","device_id":"DOOR-002"}"#, "Missing device_id or command")]
#[case(r#"{"type":"command","device_id":"DOOR-002","command":"fly"}"#, "Invalid command: fly")]
#[tokio::test]
async fn test_malformed_observer_frame_gets_error(#[case] text: &str, #[case] message: &str) {
    let state = build_state();
    let (conn, mut observer) = state.connections().connect_observer().await;
    drain(&mut observer);

    state.service.handle_observer_frame(conn, text).await;

    let frames = drain(&mut observer);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
    assert_eq!(frames[0]["message"], message);
    assert!(state.service.access_logs(10).await.is_empty());
}

#[tokio::test]
async fn test_observer_command_defaults_to_admin() {
    let state = build_state();
    let (conn, mut observer) = state.connections().connect_observer().await;
    let (other, mut bystander) = state.connections().connect_observer().await;
    drain(&mut observer);
    drain(&mut bystander);

    state
        .service
        .handle_observer_frame(conn, r#"{"type":"command","device_id":"DOOR-002","command":"lock"}"#)
        .await;

    let frames = drain(&mut observer);
    let responses = of_type(&frames, "command_response");
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["data"]["access_granted"], true);
    assert_eq!(responses[0]["data"]["message"], DecisionMessages::LOCKED);

    // Only the caller gets the response; everyone gets the broadcasts.
    let seen = drain(&mut bystander);
    assert!(of_type(&seen, "command_response").is_empty());
    assert_eq!(of_type(&seen, "access_event").len(), 1);
    assert_eq!(of_type(&seen, "device_state_change").len(), 1);
    assert!(state.connections().disconnect_observer(other).await);
}

#[tokio::test]
async fn test_observer_ping() {
    let state = build_state();
    let (conn, mut observer) = state.connections().connect_observer().await;
    drain(&mut observer);

    state.service.handle_observer_frame(conn, r#"{"type":"ping"}"#).await;

    let frames = drain(&mut observer);
    assert_eq!(frames[0]["type"], "pong");
}

#[rstest]
#[case(r#"{"type":"ping"}"#, "pong")]
#[case("{broken", "error")]
#[case(r#"{"type":"status_update","data":{"physical_status":"ajar"}}"#, "error")]
#[tokio::test]
async fn test_device_frame_replies(#[case] text: &str, #[case] reply: &str) {
    let state = build_state();
    let id = door(PHYSICAL_DOOR);
    let (_, mut device) = state.connections().connect_device(&id).await;

    state.service.handle_device_frame(&id, text).await;

    let frames = drain(&mut device);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], reply);
}

#[tokio::test]
async fn test_device_command_result_is_silent() {
    let state = build_state();
    let id = door(PHYSICAL_DOOR);
    let (_, mut device) = state.connections().connect_device(&id).await;

    state
        .service
        .handle_device_frame(&id, r#"{"type":"command_response","command":"open","success":true,"message":"ok"}"#)
        .await;

    assert!(drain(&mut device).is_empty());
    assert!(state.service.access_logs(10).await.is_empty());
}

// ========================================
// Device admission
// ========================================

#[tokio::test]
async fn test_admit_device() {
    let state = build_state();
    let service = &state.service;

    assert_eq!(service.admit_device(PHYSICAL_DOOR).await.unwrap(), door(PHYSICAL_DOOR));
    assert!(matches!(
        service.admit_device(VIRTUAL_DOOR).await,
        Err(Error::InvalidValue { field: "device_type", .. })
    ));
    assert!(matches!(service.admit_device("DOOR-404").await, Err(Error::NotFound(_))));
    assert!(matches!(service.admit_device(" ").await, Err(Error::InvalidDoorId(_))));
}

#[tokio::test]
async fn test_attached_controller_is_greeted_and_reports_state() {
    let state = build_state();
    let service = &state.service;
    let id = service.admit_device(PHYSICAL_DOOR).await.unwrap();

    let (_, mut device) = service.attach_device(&id).await;

    let greeting = drain(&mut device);
    assert_eq!(greeting.len(), 1);
    assert_eq!(greeting[0]["type"], "handshake");
    assert_eq!(
        service.registry().get(&id).await.unwrap().physical_status,
        PhysicalStatus::Closed
    );

    // The door was already open when the controller came up.
    service
        .handle_device_frame(&id, r#"{"type":"status_update","data":{"physical_status":"open"},"timestamp":42}"#)
        .await;

    let stored = service.registry().get(&id).await.unwrap();
    assert_eq!(stored.physical_status, PhysicalStatus::Open);
    assert_eq!(stored.connection_status, ConnectionStatus::Online);
    assert_eq!(drain(&mut device)[0]["type"], "ack");
}

#[tokio::test]
async fn test_malformed_door_id_answers_alike_from_observer_and_http() {
    let state = build_state();
    let (conn, mut observer) = state.connections().connect_observer().await;
    drain(&mut observer);

    state
        .service
        .handle_observer_frame(conn, r#"{"type":"command","device_id":"DOOR 1","command":"open"}"#)
        .await;
    let raw = state.service.handle_raw_command("DOOR 1", ADMIN, "open").await;

    let frames = drain(&mut observer);
    let responses = of_type(&frames, "command_response");
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["data"]["access_granted"], false);
    assert_eq!(responses[0]["data"]["message"], "Device DOOR 1 not found");
    assert_eq!(responses[0]["data"]["message"], raw.message.as_str());
    assert!(of_type(&frames, "error").is_empty());
    assert!(state.service.access_logs(10).await.is_empty());
}
