//! Attempt throttling per (door, user) pair.
//!
//! The throttle keeps an append-only ledger of [`AttemptRecord`]s and
//! answers two questions before an attempt reaches the decision engine:
//!
//! 1. **Lockout**: has the pair failed `max_failed_attempts` times inside
//!    the trailing lockout window? If so it stays locked until the last
//!    failure plus the window.
//! 2. **Rate limit**: has the pair made `max_attempts_per_minute` attempts
//!    (successful or not) inside the trailing minute?
//!
//! Records older than the retention horizon are purged lazily, at most once
//! per cleanup interval, as a side effect of [`AttemptThrottle::check`].
//!
//! Every operation has an `_at` variant taking the current time explicitly,
//! which keeps the window arithmetic testable without sleeping.
//!
//! # Examples
//!
//! ```
//! use doorman_access::{AttemptThrottle, ThrottleConfig};
//! use doorman_core::{AccessCommand, DoorId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let throttle = AttemptThrottle::new(ThrottleConfig::default());
//! let door = DoorId::new("DOOR-001")?;
//!
//! let verdict = throttle.check(&door, "alice", AccessCommand::Open).await;
//! assert!(verdict.is_allowed());
//!
//! throttle.record(&door, "alice", AccessCommand::Open, false).await;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use doorman_core::constants::{
    DEFAULT_ATTEMPT_RETENTION_HOURS, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_LOCKOUT_WINDOW_SECS,
    DEFAULT_MAX_ATTEMPTS_PER_MINUTE, DEFAULT_MAX_FAILED_ATTEMPTS, RATE_LIMIT_WINDOW_SECS,
};
use doorman_core::{AccessCommand, DoorId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Throttle limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub max_attempts_per_minute: usize,
    pub max_failed_attempts: usize,
    pub lockout_window_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retention_hours: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_minute: DEFAULT_MAX_ATTEMPTS_PER_MINUTE,
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_window_secs: DEFAULT_LOCKOUT_WINDOW_SECS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            retention_hours: DEFAULT_ATTEMPT_RETENTION_HOURS,
        }
    }
}

impl ThrottleConfig {
    fn lockout_window(&self) -> TimeDelta {
        seconds(self.lockout_window_secs)
    }

    fn cleanup_interval(&self) -> TimeDelta {
        seconds(self.cleanup_interval_secs)
    }

    fn retention(&self) -> TimeDelta {
        seconds(self.retention_hours.saturating_mul(3600))
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

fn rate_window() -> TimeDelta {
    seconds(RATE_LIMIT_WINDOW_SECS)
}

/// One throttle-guarded attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    pub device_id: DoorId,
    pub user_id: String,
    pub command: AccessCommand,
    pub success: bool,
}

impl AttemptRecord {
    fn belongs_to(&self, device_id: &DoorId, user_id: &str) -> bool {
        &self.device_id == device_id && self.user_id == user_id
    }
}

/// Answer to [`AttemptThrottle::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    Allowed,
    LockedOut { remaining_secs: u64 },
    RateLimited { limit: usize },
}

impl ThrottleVerdict {
    #[inline]
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, ThrottleVerdict::Allowed)
    }

    /// Human readable reason, as returned to the caller.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            ThrottleVerdict::Allowed => "Rate limit check passed".to_string(),
            ThrottleVerdict::LockedOut { remaining_secs } => {
                format!("Too many failed attempts. Locked out for {remaining_secs} seconds")
            }
            ThrottleVerdict::RateLimited { limit } => {
                format!("Rate limit exceeded. Max {limit} attempts per minute")
            }
        }
    }
}

/// Ledger-wide figures over the last hour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrottleStats {
    pub total_attempts_last_hour: usize,
    pub successful_attempts_last_hour: usize,
    pub failed_attempts_last_hour: usize,
    pub unique_users_last_hour: usize,
    pub unique_devices_last_hour: usize,
    pub total_records: usize,
    pub config: ThrottleConfig,
}

/// Throttle state of one (door, user) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairStatus {
    pub device_id: DoorId,
    pub user_id: String,
    pub attempts_last_minute: usize,
    pub failed_attempts_recent: usize,
    pub is_locked_out: bool,
    pub lockout_expires: Option<DateTime<Utc>>,
    pub remaining_lockout_seconds: u64,
}

#[derive(Debug)]
struct Ledger {
    records: Vec<AttemptRecord>,
    last_cleanup: DateTime<Utc>,
}

impl Ledger {
    /// Expiry of the pair's lockout, if one is in force at `now`.
    fn lockout_until(
        &self,
        config: &ThrottleConfig,
        device_id: &DoorId,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> (usize, Option<DateTime<Utc>>) {
        let window = config.lockout_window();
        let since = now - window;

        let mut failures = 0usize;
        let mut last_failed: Option<DateTime<Utc>> = None;
        for record in self
            .records
            .iter()
            .filter(|r| r.belongs_to(device_id, user_id) && !r.success && r.timestamp > since)
        {
            failures += 1;
            last_failed = last_failed.max(Some(record.timestamp));
        }

        let expires = last_failed
            .filter(|_| failures >= config.max_failed_attempts)
            .map(|last| last + window)
            .filter(|expires| now < *expires);

        (failures, expires)
    }

    fn attempts_last_minute(&self, device_id: &DoorId, user_id: &str, now: DateTime<Utc>) -> usize {
        let since = now - rate_window();
        self.records
            .iter()
            .filter(|r| r.belongs_to(device_id, user_id) && r.timestamp > since)
            .count()
    }

    fn purge_if_due(&mut self, config: &ThrottleConfig, now: DateTime<Utc>) {
        if now - self.last_cleanup <= config.cleanup_interval() {
            return;
        }
        let horizon = now - config.retention();
        let before = self.records.len();
        self.records.retain(|r| r.timestamp > horizon);
        self.last_cleanup = now;

        let purged = before - self.records.len();
        if purged > 0 {
            info!(purged, remaining = self.records.len(), "Purged expired attempt records");
        }
    }
}

/// Rate and lockout guard in front of the decision engine.
#[derive(Debug)]
pub struct AttemptThrottle {
    config: ThrottleConfig,
    ledger: Mutex<Ledger>,
}

impl AttemptThrottle {
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            ledger: Mutex::new(Ledger {
                records: Vec::new(),
                last_cleanup: Utc::now(),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Decide whether the pair may attempt `command` now.
    pub async fn check(
        &self,
        device_id: &DoorId,
        user_id: &str,
        command: AccessCommand,
    ) -> ThrottleVerdict {
        self.check_at(device_id, user_id, command, Utc::now()).await
    }

    /// [`check`](Self::check) at an explicit instant.
    pub async fn check_at(
        &self,
        device_id: &DoorId,
        user_id: &str,
        command: AccessCommand,
        now: DateTime<Utc>,
    ) -> ThrottleVerdict {
        let mut ledger = self.ledger.lock().await;
        ledger.purge_if_due(&self.config, now);

        if let (_, Some(expires)) = ledger.lockout_until(&self.config, device_id, user_id, now) {
            let remaining_secs = ceil_secs(expires - now);
            debug!(device_id = %device_id, user_id, %command, remaining_secs, "Attempt rejected by lockout");
            return ThrottleVerdict::LockedOut { remaining_secs };
        }

        if ledger.attempts_last_minute(device_id, user_id, now) >= self.config.max_attempts_per_minute {
            debug!(device_id = %device_id, user_id, %command, "Attempt rejected by rate limit");
            return ThrottleVerdict::RateLimited {
                limit: self.config.max_attempts_per_minute,
            };
        }

        ThrottleVerdict::Allowed
    }

    /// Append the outcome of an attempt to the ledger.
    pub async fn record(&self, device_id: &DoorId, user_id: &str, command: AccessCommand, success: bool) {
        self.record_at(device_id, user_id, command, success, Utc::now())
            .await;
    }

    /// [`record`](Self::record) at an explicit instant.
    pub async fn record_at(
        &self,
        device_id: &DoorId,
        user_id: &str,
        command: AccessCommand,
        success: bool,
        now: DateTime<Utc>,
    ) {
        self.ledger.lock().await.records.push(AttemptRecord {
            timestamp: now,
            device_id: device_id.clone(),
            user_id: user_id.to_string(),
            command,
            success,
        });
    }

    pub async fn stats(&self) -> ThrottleStats {
        self.stats_at(Utc::now()).await
    }

    /// Figures for the hour preceding `now`.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> ThrottleStats {
        let ledger = self.ledger.lock().await;
        let since = now - TimeDelta::hours(1);

        let recent: Vec<&AttemptRecord> =
            ledger.records.iter().filter(|r| r.timestamp > since).collect();
        let successful = recent.iter().filter(|r| r.success).count();
        let users: HashSet<&str> = recent.iter().map(|r| r.user_id.as_str()).collect();
        let devices: HashSet<&DoorId> = recent.iter().map(|r| &r.device_id).collect();

        ThrottleStats {
            total_attempts_last_hour: recent.len(),
            successful_attempts_last_hour: successful,
            failed_attempts_last_hour: recent.len() - successful,
            unique_users_last_hour: users.len(),
            unique_devices_last_hour: devices.len(),
            total_records: ledger.records.len(),
            config: self.config,
        }
    }

    pub async fn status(&self, device_id: &DoorId, user_id: &str) -> PairStatus {
        self.status_at(device_id, user_id, Utc::now()).await
    }

    /// Throttle state of one pair at `now`.
    pub async fn status_at(&self, device_id: &DoorId, user_id: &str, now: DateTime<Utc>) -> PairStatus {
        let ledger = self.ledger.lock().await;
        let (failures, expires) = ledger.lockout_until(&self.config, device_id, user_id, now);

        PairStatus {
            device_id: device_id.clone(),
            user_id: user_id.to_string(),
            attempts_last_minute: ledger.attempts_last_minute(device_id, user_id, now),
            failed_attempts_recent: failures,
            is_locked_out: expires.is_some(),
            lockout_expires: expires,
            remaining_lockout_seconds: expires.map_or(0, |e| ceil_secs(e - now)),
        }
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.ledger.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ledger.lock().await.records.is_empty()
    }
}

impl Default for AttemptThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

fn ceil_secs(delta: TimeDelta) -> u64 {
    let millis = delta.num_milliseconds().max(0);
    u64::try_from((millis + 999) / 1000).unwrap_or(0)
}
