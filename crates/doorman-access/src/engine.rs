//! Access decision state machine.
//!
//! Deciding a command happens in two steps:
//!
//! 1. [`AccessPolicy::evaluate`] is a pure function of the door record, the
//!    caller and the command. It returns a [`Verdict`] naming the action to
//!    take, without performing it.
//! 2. [`DecisionEngine::decide`] carries the verdict out: it persists a new
//!    door state through the [`DoorMutator`], or sends a command to the
//!    controller through the [`Dispatcher`], and folds the result into a
//!    [`Decision`].
//!
//! # Rules
//!
//! | Command  | Denied when                    | No-op when       | Action                    |
//! |----------|--------------------------------|------------------|---------------------------|
//! | `open`   | locked and caller is not admin | already open     | dispatch (physical) / set |
//! | `close`  | never                          | already closed   | dispatch (physical) / set |
//! | `lock`   | caller is not admin            | already locked   | set lock state            |
//! | `unlock` | caller is not admin            | already unlocked | set lock state            |
//!
//! Physical doors never change state as a direct result of a decision: the
//! controller reports the new state once the leaf actually moves.

use crate::messages::DecisionMessages;
use doorman_core::{
    AccessCommand, AccessStatus, Dispatcher, Door, DoorMutator, DoorPatch, Error, LockState,
    PhysicalStatus,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Action selected by [`AccessPolicy::evaluate`].
#[derive(Debug)]
pub enum Verdict {
    /// Reject the attempt.
    Deny(Error),
    /// Accept without touching the door.
    NoOp(&'static str),
    /// Accept and persist `patch`.
    Mutate {
        patch: DoorPatch,
        message: &'static str,
    },
    /// Accept by forwarding `command` to the door's controller.
    Dispatch(AccessCommand),
}

/// Per-command rules. Holds nothing but the admin identity.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    admin_id: String,
}

impl AccessPolicy {
    #[must_use]
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into().to_lowercase(),
        }
    }

    /// Case-insensitive comparison against the configured admin id.
    #[inline]
    #[must_use]
    pub fn is_admin(&self, caller_id: &str) -> bool {
        caller_id.to_lowercase() == self.admin_id
    }

    /// Select the action for `command` on `door`.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorman_access::{AccessPolicy, Verdict};
    /// use doorman_core::{AccessCommand, DeviceType, Door, DoorId, LockState};
    ///
    /// let policy = AccessPolicy::new("admin");
    /// let door = Door::new(DoorId::new("DOOR-002").unwrap(), "Lab", DeviceType::Virtual)
    ///     .with_lock_state(LockState::Locked);
    ///
    /// assert!(matches!(policy.evaluate(&door, "guest", AccessCommand::Open), Verdict::Deny(_)));
    /// assert!(matches!(policy.evaluate(&door, "ADMIN", AccessCommand::Open), Verdict::Mutate { .. }));
    /// ```
    #[must_use]
    pub fn evaluate(&self, door: &Door, caller_id: &str, command: AccessCommand) -> Verdict {
        let is_admin = self.is_admin(caller_id);

        match command {
            AccessCommand::Open => {
                if door.lock_state.is_locked() && !is_admin {
                    return Verdict::Deny(Error::unauthorized(DecisionMessages::LOCKED_NOT_ADMIN));
                }
                Self::move_leaf(door, PhysicalStatus::Open)
            }
            AccessCommand::Close => Self::move_leaf(door, PhysicalStatus::Closed),
            AccessCommand::Lock => {
                if !is_admin {
                    return Verdict::Deny(Error::unauthorized(DecisionMessages::LOCK_NOT_ADMIN));
                }
                Self::set_lock(door, LockState::Locked)
            }
            AccessCommand::Unlock => {
                if !is_admin {
                    return Verdict::Deny(Error::unauthorized(DecisionMessages::UNLOCK_NOT_ADMIN));
                }
                Self::set_lock(door, LockState::Unlocked)
            }
        }
    }

    fn move_leaf(door: &Door, target: PhysicalStatus) -> Verdict {
        let (already, done, command) = match target {
            PhysicalStatus::Open => (
                DecisionMessages::ALREADY_OPEN,
                DecisionMessages::OPENED,
                AccessCommand::Open,
            ),
            PhysicalStatus::Closed => (
                DecisionMessages::ALREADY_CLOSED,
                DecisionMessages::CLOSED,
                AccessCommand::Close,
            ),
        };

        if door.physical_status == target {
            Verdict::NoOp(already)
        } else if door.is_physical() {
            Verdict::Dispatch(command)
        } else {
            Verdict::Mutate {
                patch: DoorPatch::physical(target),
                message: done,
            }
        }
    }

    fn set_lock(door: &Door, target: LockState) -> Verdict {
        let (already, done) = match target {
            LockState::Locked => (DecisionMessages::ALREADY_LOCKED, DecisionMessages::LOCKED),
            LockState::Unlocked => (DecisionMessages::ALREADY_UNLOCKED, DecisionMessages::UNLOCKED),
        };

        if door.lock_state == target {
            Verdict::NoOp(already)
        } else {
            Verdict::Mutate {
                patch: DoorPatch::lock(target),
                message: done,
            }
        }
    }
}

/// Outcome of [`DecisionEngine::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub status: AccessStatus,
    pub message: String,
    /// Door record after a persisted change. `None` when nothing changed,
    /// including when a command was only forwarded to a controller.
    pub door: Option<Door>,
    /// The command was sent to the door's controller.
    pub dispatched: bool,
}

impl Decision {
    #[must_use]
    pub fn granted(message: impl Into<String>, door: Option<Door>) -> Self {
        Self {
            status: AccessStatus::Granted,
            message: message.into(),
            door,
            dispatched: false,
        }
    }

    /// Granted by forwarding the command to the controller.
    #[must_use]
    pub fn forwarded(message: impl Into<String>) -> Self {
        Self {
            status: AccessStatus::Granted,
            message: message.into(),
            door: None,
            dispatched: true,
        }
    }

    #[must_use]
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            status: AccessStatus::Denied,
            message: message.into(),
            door: None,
            dispatched: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.status.is_granted()
    }
}

/// Applies [`AccessPolicy`] verdicts through injected capabilities.
#[derive(Debug)]
pub struct DecisionEngine<D, M> {
    policy: AccessPolicy,
    dispatcher: Arc<D>,
    mutator: Arc<M>,
}

impl<D: Dispatcher, M: DoorMutator> DecisionEngine<D, M> {
    #[must_use]
    pub fn new(admin_id: impl Into<String>, dispatcher: Arc<D>, mutator: Arc<M>) -> Self {
        Self {
            policy: AccessPolicy::new(admin_id),
            dispatcher,
            mutator,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Decide `command` on `door` for `caller_id` and carry out the result.
    pub async fn decide(&self, door: &Door, caller_id: &str, command: AccessCommand) -> Decision {
        let decision = match self.policy.evaluate(door, caller_id, command) {
            Verdict::Deny(reason) => Decision::denied(reason.denial_message()),
            Verdict::NoOp(message) => Decision::granted(message, None),
            Verdict::Mutate { patch, message } => {
                match self.mutator.update_door(&door.door_id, patch).await {
                    Some(updated) => Decision::granted(message, Some(updated)),
                    None => Decision::denied(Error::NotFound(door.door_id.to_string()).denial_message()),
                }
            }
            Verdict::Dispatch(forwarded) => {
                if self.dispatcher.dispatch(&door.door_id, forwarded).await {
                    let message = match forwarded {
                        AccessCommand::Close => DecisionMessages::CLOSE_SENT,
                        _ => DecisionMessages::OPEN_SENT,
                    };
                    Decision::forwarded(message)
                } else {
                    let err = Error::DeviceUnavailable(DecisionMessages::DEVICE_NOT_CONNECTED.to_string());
                    warn!(device_id = %door.door_id, command = %forwarded, "Dispatch failed, controller not connected");
                    Decision::denied(err.denial_message())
                }
            }
        };

        debug!(
            device_id = %door.door_id,
            user_id = caller_id,
            %command,
            status = %decision.status,
            message = %decision.message,
            "Access decided"
        );
        decision
    }
}
