//! Access decisions for the doorman gateway.
//!
//! Two guards stand between a command and a door:
//!
//! ```text
//!   command ──▶ AttemptThrottle::check ──▶ DecisionEngine::decide ──▶ Decision
//!                  (rate / lockout)          (lock state, admin,
//!                                             device dispatch)
//! ```
//!
//! The [`AttemptThrottle`] keeps a ledger of recent attempts per
//! (door, user) pair. The [`DecisionEngine`] applies the per-command rules
//! through an [`AccessPolicy`] and carries out the resulting action through
//! the injected [`Dispatcher`](doorman_core::Dispatcher) and
//! [`DoorMutator`](doorman_core::DoorMutator).

pub mod engine;
pub mod messages;
pub mod throttle;

pub use engine::{AccessPolicy, Decision, DecisionEngine, Verdict};
pub use messages::DecisionMessages;
pub use throttle::{AttemptRecord, AttemptThrottle, PairStatus, ThrottleConfig, ThrottleStats, ThrottleVerdict};
