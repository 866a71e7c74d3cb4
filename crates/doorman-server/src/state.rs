//! Shared application state.

use crate::config::{ConfigError, ServerConfig};
use crate::service::AccessService;
use doorman_access::AttemptThrottle;
use doorman_network::ConnectionManager;
use doorman_storage::{AccessLogStore, DoorRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// State handed to every HTTP and WebSocket handler.
///
/// Built once at startup from the configuration; dropping the last clone
/// releases the stores and every connection sender.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<AccessService>,
    pub config: Arc<ServerConfig>,
    /// Cancelled when the gateway shuts down. Open sockets close on it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the stores, the throttle, the connection manager and the
    /// façade from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDoor`] if the door seeds are invalid
    /// or duplicated.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ConfigError> {
        let doors = config.seed_doors()?;
        let registry = Arc::new(DoorRegistry::with_doors(doors));
        let logs = Arc::new(AccessLogStore::new());
        let throttle = Arc::new(AttemptThrottle::new(config.throttle));
        let connections = Arc::new(ConnectionManager::new(registry.clone()));

        let service = AccessService::new(
            registry,
            logs,
            throttle,
            connections,
            config.admin_user_id.clone(),
        );
        info!(
            doors = config.doors.len(),
            admin_user_id = %config.admin_user_id,
            "Application state initialized"
        );

        Ok(Self {
            service: Arc::new(service),
            config: Arc::new(config.clone()),
            shutdown: CancellationToken::new(),
        })
    }

    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        self.service.connections()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorman_core::DoorId;

    #[tokio::test]
    async fn test_default_config_seeds_registry() {
        let state = AppState::from_config(&ServerConfig::default()).unwrap();

        let doors = state.service.doors().await;
        assert_eq!(doors.len(), 2);
        assert_eq!(doors[0].door_id, DoorId::new("DOOR-001").unwrap());
        assert!(doors[0].lock_state.is_locked());
        assert_eq!(state.connections().observer_count().await, 0);
    }
}
