//! Lock gate primitives.
//!
//! A lock is either `manual` (role-gated until someone deletes it, never
//! expires on its own) or `timer` (role-gated until its timeout passes,
//! then open to everyone, immutable and undeletable once created). The
//! functions here are pure: callers pass `now` in, together with the
//! `timeout` and `access` values read from a single lock row, so the
//! decision cannot race against a concurrent lock change.

use chrono::Duration;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Lock discriminator. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockType {
    Manual,
    Timer,
}

impl LockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockType::Manual => "manual",
            LockType::Timer => "timer",
        }
    }

    /// Parse a stored discriminator. An unknown value can only come from
    /// the store, so it surfaces as an internal error, not a caller error.
    pub fn parse(raw: &str) -> Result<LockType, CoreError> {
        match raw {
            "manual" => Ok(LockType::Manual),
            "timer" => Ok(LockType::Timer),
            other => Err(CoreError::Internal(format!(
                "unknown lock type {other:?} in store"
            ))),
        }
    }
}

impl std::fmt::Display for LockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether a caller passes a lock gate.
///
/// An elapsed timer timeout opens the gate unconditionally; otherwise the
/// caller must hold the lock's access role. `timeout` and `required_role`
/// must come from the same row read.
pub fn authorize(
    now: Timestamp,
    timeout: Option<Timestamp>,
    required_role: &str,
    caller_roles: &[String],
) -> Result<(), CoreError> {
    if let Some(timeout) = timeout {
        if now > timeout {
            return Ok(());
        }
    }

    if caller_roles.iter().any(|r| r == required_role) {
        return Ok(());
    }

    Err(CoreError::Unauthorized(
        "missing the role required by this lock".into(),
    ))
}

/// Whether a lock is expired when viewed `grace_minutes` into the future.
///
/// Manual locks never expire. The grace window is how "must have at least
/// N minutes of expiry left" checks are phrased: never compare raw `now`
/// against the timeout for those checks.
pub fn is_expired(
    lock_type: LockType,
    timeout: Option<Timestamp>,
    grace_minutes: i64,
    now: Timestamp,
) -> Result<bool, CoreError> {
    if lock_type == LockType::Manual {
        return Ok(false);
    }

    // should be unrepresentable in the store, but cheap to keep honest
    let Some(timeout) = timeout else {
        return Err(CoreError::Internal(
            "timer lock has no timeout".into(),
        ));
    };

    Ok(now + Duration::minutes(grace_minutes) > timeout)
}

/// Validate a lock about to be created.
///
/// Manual locks must not carry a timeout. Timer locks must carry one that
/// is neither the unset epoch sentinel nor in the past.
pub fn validate_new_lock(
    lock_type: LockType,
    timeout: Option<Timestamp>,
    now: Timestamp,
) -> Result<(), CoreError> {
    match lock_type {
        LockType::Manual => {
            if timeout.is_some() {
                return Err(CoreError::InvalidRequest(
                    "a manual lock cannot have a timeout".into(),
                ));
            }
            Ok(())
        }
        LockType::Timer => {
            let Some(timeout) = timeout else {
                return Err(CoreError::InvalidRequest(
                    "a timer lock must have a timeout".into(),
                ));
            };
            if timeout == Timestamp::UNIX_EPOCH {
                return Err(CoreError::InvalidRequest(
                    "timeout looks unset, please check its format".into(),
                ));
            }
            if timeout <= now {
                return Err(CoreError::InvalidRequest(
                    "a timer lock's timeout must be in the future".into(),
                ));
            }
            Ok(())
        }
    }
}

/// Validate an update against the lock being replaced.
///
/// The lock type is not part of the update payload, so it cannot change;
/// timer locks additionally reject every field update.
pub fn validate_lock_update(
    previous_type: LockType,
    new_timeout: Option<Timestamp>,
) -> Result<(), CoreError> {
    if previous_type == LockType::Timer {
        return Err(CoreError::InvalidRequest(
            "a timer lock cannot be updated once created".into(),
        ));
    }

    if new_timeout.is_some() {
        return Err(CoreError::InvalidRequest(
            "a manual lock cannot have a timeout".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    use crate::error::ErrorKind;

    fn minutes(m: i64) -> Duration {
        Duration::minutes(m)
    }

    #[test]
    fn expired_timer_authorizes_anyone() {
        let now = Utc::now();
        let result = authorize(now, Some(now - minutes(1)), "manager", &[]);
        assert!(result.is_ok());
    }

    #[test]
    fn live_timer_requires_role() {
        let now = Utc::now();
        let timeout = Some(now + minutes(60));
        assert_matches!(
            authorize(now, timeout, "manager", &[]),
            Err(CoreError::Unauthorized(_))
        );
        let roles = vec!["user".to_string(), "manager".to_string()];
        assert!(authorize(now, timeout, "manager", &roles).is_ok());
    }

    #[test]
    fn manual_lock_requires_role_forever() {
        let now = Utc::now();
        assert_matches!(
            authorize(now, None, "manager", &["user".to_string()]),
            Err(CoreError::Unauthorized(_))
        );
    }

    #[test]
    fn manual_lock_never_expires() {
        let now = Utc::now();
        assert!(!is_expired(LockType::Manual, None, 0, now).unwrap());
        assert!(!is_expired(LockType::Manual, None, 1_000_000, now).unwrap());
    }

    #[test]
    fn timer_without_timeout_is_internal() {
        let err = is_expired(LockType::Timer, None, 0, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn expiry_is_monotonic_in_grace() {
        let now = Utc::now();
        let timeout = Some(now + minutes(30));
        // not expired raw, expired once the grace window reaches past it
        assert!(!is_expired(LockType::Timer, timeout, 0, now).unwrap());
        assert!(!is_expired(LockType::Timer, timeout, 29, now).unwrap());
        assert!(is_expired(LockType::Timer, timeout, 31, now).unwrap());
        assert!(is_expired(LockType::Timer, timeout, 1440, now).unwrap());
    }

    #[test]
    fn new_manual_lock_rejects_timeout() {
        let now = Utc::now();
        assert!(validate_new_lock(LockType::Manual, None, now).is_ok());
        assert_matches!(
            validate_new_lock(LockType::Manual, Some(now + minutes(5)), now),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn new_timer_lock_needs_future_timeout() {
        let now = Utc::now();
        assert_matches!(
            validate_new_lock(LockType::Timer, None, now),
            Err(CoreError::InvalidRequest(_))
        );
        assert_matches!(
            validate_new_lock(LockType::Timer, Some(Timestamp::UNIX_EPOCH), now),
            Err(CoreError::InvalidRequest(_))
        );
        assert_matches!(
            validate_new_lock(LockType::Timer, Some(now - minutes(1)), now),
            Err(CoreError::InvalidRequest(_))
        );
        assert!(validate_new_lock(LockType::Timer, Some(now + minutes(1)), now).is_ok());
    }

    #[test]
    fn timer_lock_rejects_all_updates() {
        assert_matches!(
            validate_lock_update(LockType::Timer, None),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn manual_lock_update_must_stay_timerless() {
        assert!(validate_lock_update(LockType::Manual, None).is_ok());
        assert_matches!(
            validate_lock_update(LockType::Manual, Some(Utc::now())),
            Err(CoreError::InvalidRequest(_))
        );
    }

    #[test]
    fn lock_type_round_trips() {
        assert_eq!(LockType::parse("manual").unwrap(), LockType::Manual);
        assert_eq!(LockType::parse("timer").unwrap(), LockType::Timer);
        assert_eq!(LockType::Timer.as_str(), "timer");
        assert_matches!(LockType::parse("frozen"), Err(CoreError::Internal(_)));
    }
}
