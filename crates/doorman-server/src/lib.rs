//! Doorman gateway server.
//!
//! Wires the stores, the attempt throttle, the decision engine and the
//! connection manager into one [`AppState`], and exposes them over HTTP
//! and WebSocket with axum.
//!
//! # Lifecycle
//!
//! ```text
//!   ServerConfig ──▶ AppState::from_config ──▶ serve()
//!                                               ├─ HeartbeatMonitor::start
//!                                               ├─ axum::serve (graceful)
//!                                               └─ on shutdown: close sockets,
//!                                                  drain HTTP, stop heartbeat
//! ```
//!
//! There is no process-wide state: everything lives in the [`AppState`]
//! built by the caller and is released when [`serve`] returns.

pub mod config;
pub mod error;
pub mod routes;
pub mod service;
pub mod state;
pub mod ws;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ServerError};
pub use routes::router;
pub use service::{AccessService, CommandOutcome};
pub use state::AppState;

use doorman_network::HeartbeatMonitor;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

/// Build the state from `config`, bind, and serve until `signal`
/// completes.
///
/// # Errors
///
/// Returns [`ServerError`] if the configuration is invalid or the
/// listener cannot be bound.
pub async fn run<F>(config: ServerConfig, signal: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(config.bind_addr()?).await?;

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        signal.await;
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    serve(listener, state).await
}

/// Serve the gateway on an already bound listener until
/// `state.shutdown` is cancelled.
///
/// The heartbeat monitor runs for exactly as long as this call.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the server fails.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), ServerError> {
    let shutdown = state.shutdown.clone();
    let heartbeat = HeartbeatMonitor::new(state.connections().clone(), state.config.heartbeat)
        .start(shutdown.clone());

    let addr = listener.local_addr()?;
    info!(%addr, "Doorman gateway listening");

    let app = router(state);
    let drain = shutdown.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { drain.cancelled().await })
        .await;

    shutdown.cancel();
    heartbeat.shutdown().await;
    info!("Doorman gateway stopped");

    result.map_err(ServerError::from)
}
