//! REST API routes.
//!
//! | Method | Path                                         | Handler               |
//! |--------|----------------------------------------------|-----------------------|
//! | GET    | `/`                                          | service information   |
//! | GET    | `/api/health`                                | liveness              |
//! | GET    | `/api/devices/status`                        | every door record     |
//! | GET    | `/api/access_logs?limit=`                    | newest events first   |
//! | DELETE | `/api/access_logs`                           | reset the log         |
//! | GET    | `/api/access_logs/{device_id}?limit=`        | events of one door    |
//! | POST   | `/api/access_log`                            | run a command         |
//! | GET    | `/api/rate_limit/stats`                      | throttle totals       |
//! | GET    | `/api/rate_limit/status/{device_id}/{user}`  | throttle state        |
//!
//! The WebSocket endpoints live in [`crate::ws`].

use crate::error::{ApiError, ApiResult};
use crate::service::CommandOutcome;
use crate::state::AppState;
use crate::ws;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderValue,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use doorman_access::{PairStatus, ThrottleStats};
use doorman_core::constants::{DEFAULT_DEVICE_LOG_LIMIT, DEFAULT_LOG_LIMIT, MAX_LOG_LIMIT};
use doorman_core::{AccessEvent, Door, DoorId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub const SERVICE_NAME: &str = "Doorman Access Control Gateway";

/// Build the full router: REST API, WebSocket endpoints, tracing and CORS.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/devices/status", get(devices_status))
        .route("/api/access_logs", get(access_logs).delete(clear_access_logs))
        .route("/api/access_logs/:device_id", get(device_access_logs))
        .route("/api/access_log", post(create_access_log))
        .route("/api/rate_limit/stats", get(rate_limit_stats))
        .route("/api/rate_limit/status/:device_id/:user_id", get(rate_limit_status))
        .route("/ws", get(ws::observer_handler))
        .route("/ws/:door_id", get(ws::device_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

// ========================================
// Request / response bodies
// ========================================

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn resolve(&self, default: usize) -> ApiResult<usize> {
        let Some(limit) = self.limit else {
            return Ok(default);
        };
        usize::try_from(limit)
            .ok()
            .filter(|limit| (1..=MAX_LOG_LIMIT).contains(limit))
            .ok_or_else(|| ApiError::Validation(format!("limit must be between 1 and {MAX_LOG_LIMIT}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessAttempt {
    pub device_id: String,
    pub user_id: String,
    pub command: String,
}

#[derive(Debug, Serialize)]
pub struct DevicesStatus {
    pub devices: Vec<Door>,
    pub timestamp: DateTime<Utc>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct AccessLogs {
    pub logs: Vec<AccessEvent>,
    pub timestamp: DateTime<Utc>,
    pub total_count: usize,
}

impl AccessLogs {
    fn new(logs: Vec<AccessEvent>) -> Self {
        Self {
            total_count: logs.len(),
            logs,
            timestamp: Utc::now(),
        }
    }
}

// ========================================
// Handlers
// ========================================

async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "api": "/api",
            "health": "/api/health",
            "observers": "/ws",
            "devices": "/ws/{door_id}",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

async fn devices_status(State(state): State<AppState>) -> Json<DevicesStatus> {
    let devices = state.service.doors().await;
    Json(DevicesStatus {
        total_count: devices.len(),
        devices,
        timestamp: Utc::now(),
    })
}

async fn access_logs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<AccessLogs>> {
    let limit = query.resolve(DEFAULT_LOG_LIMIT)?;
    Ok(Json(AccessLogs::new(state.service.access_logs(limit).await)))
}

async fn clear_access_logs(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.service.clear_access_logs().await;
    Json(json!({ "cleared": cleared, "timestamp": Utc::now() }))
}

async fn device_access_logs(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<AccessLogs>> {
    let limit = query.resolve(DEFAULT_DEVICE_LOG_LIMIT)?;
    let door_id = known_door(&state, &device_id).await?;
    Ok(Json(AccessLogs::new(state.service.device_logs(&door_id, limit).await)))
}

async fn create_access_log(
    State(state): State<AppState>,
    Json(attempt): Json<AccessAttempt>,
) -> Json<CommandOutcome> {
    let outcome = state
        .service
        .handle_raw_command(&attempt.device_id, &attempt.user_id, &attempt.command)
        .await;
    Json(outcome)
}

async fn rate_limit_stats(State(state): State<AppState>) -> Json<ThrottleStats> {
    Json(state.service.throttle_stats().await)
}

async fn rate_limit_status(
    State(state): State<AppState>,
    Path((device_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<PairStatus>> {
    let door_id = DoorId::new(&device_id)?;
    Ok(Json(state.service.throttle_status(&door_id, &user_id).await))
}

async fn known_door(state: &AppState, device_id: &str) -> ApiResult<DoorId> {
    let not_found = || ApiError::NotFound(doorman_core::Error::NotFound(device_id.to_string()).to_string());
    let door_id = DoorId::new(device_id).map_err(|_| not_found())?;
    if state.service.registry().get(&door_id).await.is_none() {
        return Err(not_found());
    }
    Ok(door_id)
}
