//! Default values shared across the gateway.
//!
//! Every limit here can be overridden through the server configuration;
//! these are the values used when no configuration is given.
//!
//! # Usage
//!
//! ```
//! use doorman_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(DEFAULT_ADMIN_USER_ID, "admin");
//! let timeout = Duration::from_secs(DEFAULT_HEARTBEAT_TIMEOUT_SECS);
//! assert!(timeout > Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS));
//! ```

// ============================================================================
// Identities
// ============================================================================

/// Caller id compared (case-insensitively) to decide admin privileges.
pub const DEFAULT_ADMIN_USER_ID: &str = "admin";

/// User id recorded for state reported by a physical controller.
pub const DEVICE_USER_ID: &str = "device";

/// User id recorded for commands requested through a controller's button.
pub const PHYSICAL_BUTTON_USER_ID: &str = "physical_button";

// ============================================================================
// Attempt throttling
// ============================================================================

/// Attempts (successful or not) allowed per (door, user) pair per minute.
pub const DEFAULT_MAX_ATTEMPTS_PER_MINUTE: usize = 20;

/// Failed attempts inside the lockout window that trigger a lockout.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: usize = 5;

/// Trailing window for counting failures, and lockout length (seconds).
pub const DEFAULT_LOCKOUT_WINDOW_SECS: u64 = 60;

/// Trailing window for the rate limit (seconds).
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Minimum time between two ledger purges (seconds).
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60 * 60;

/// Attempt records older than this are purged (hours).
pub const DEFAULT_ATTEMPT_RETENTION_HOURS: u64 = 24;

// ============================================================================
// Device liveness
// ============================================================================

/// Period of the heartbeat monitor (seconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 10;

/// Silence after which a device is considered gone (seconds).
pub const DEFAULT_HEARTBEAT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Access log queries
// ============================================================================

/// Default number of events returned by a log listing.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// Upper bound accepted for a log listing.
pub const MAX_LOG_LIMIT: usize = 1000;

/// Default number of events returned for a single door.
pub const DEFAULT_DEVICE_LOG_LIMIT: usize = 50;
