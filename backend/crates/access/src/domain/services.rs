//! Domain Services
//!
//! Pure domain logic: the rate limit state transition and the risk table.
//! Nothing here reads a clock or touches storage.

use chrono::{DateTime, Utc};
use platform::rate_limit::{RateLimitPolicy, RateLimitResult, add_saturating};

use crate::domain::entities::RateLimitRecord;
use crate::domain::value_objects::{AuditEventType, RateLimitKey, RiskLevel};

// ============================================================================
// Risk classification
// ============================================================================

/// Risk level per audit event type
pub const RISK_TABLE: &[(AuditEventType, RiskLevel)] = &[
    (AuditEventType::RateLimitExceeded, RiskLevel::High),
    (AuditEventType::LoginFailed, RiskLevel::Medium),
    (AuditEventType::RegistrationFailed, RiskLevel::Medium),
    (AuditEventType::PasswordResetFailed, RiskLevel::Medium),
    (AuditEventType::EmailVerificationFailed, RiskLevel::Medium),
    (AuditEventType::ProtectedActionFailed, RiskLevel::Medium),
];

pub fn risk_level_for(event_type: AuditEventType) -> RiskLevel {
    RISK_TABLE
        .iter()
        .find(|(kind, _)| *kind == event_type)
        .map(|(_, level)| *level)
        .unwrap_or(RiskLevel::Critical)
}

// ============================================================================
// Rate limit transition
// ============================================================================

/// What a single check did to its record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Still inside an earlier block; nothing counted
    Blocked,
    /// New window opened with this attempt
    WindowStarted,
    /// Counted inside the current window, under the limit
    Counted,
    /// Counted and pushed over the limit; block installed
    LimitExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvaluation {
    pub outcome: AttemptOutcome,
    pub attempt_count: u32,
    pub result: RateLimitResult,
    /// A new window replaced a record whose block had expired
    pub lockout_expired: bool,
    /// This check owns writing the block's audit event
    pub audit_due: bool,
}

/// Apply one attempt to the current record.
///
/// Must run inside the store's atomic read-modify-write for `key`.
/// `policy` is expected to be validated already.
///
/// The block event is claimed (`block_audited`) in the same write that
/// installs the block. A blocked record whose event was never written
/// hands the claim to the next check, so a failed append is retried.
pub fn register_attempt(
    current: Option<RateLimitRecord>,
    key: &RateLimitKey,
    policy: &RateLimitPolicy,
    now: DateTime<Utc>,
) -> (RateLimitRecord, AttemptEvaluation) {
    let mut record = match current {
        Some(mut record) if record.is_blocked_at(now) => {
            let until = record.blocked_until.unwrap_or(now);
            let audit_due = !record.block_audited;
            record.block_audited = true;
            let evaluation = AttemptEvaluation {
                outcome: AttemptOutcome::Blocked,
                attempt_count: record.attempt_count,
                result: RateLimitResult::denied(until),
                lockout_expired: false,
                audit_due,
            };
            return (record, evaluation);
        }
        Some(record) if !record.window_stale_at(now, policy.window) => record,
        previous => {
            let lockout_expired = previous.is_some_and(|r| r.blocked_until.is_some());
            let record = RateLimitRecord::start(key, now);
            let evaluation = AttemptEvaluation {
                outcome: AttemptOutcome::WindowStarted,
                attempt_count: record.attempt_count,
                result: RateLimitResult::allowed(
                    policy.max_attempts.saturating_sub(1),
                    add_saturating(now, policy.window),
                ),
                lockout_expired,
                audit_due: false,
            };
            return (record, evaluation);
        }
    };

    record.attempt_count = record.attempt_count.saturating_add(1);

    if record.attempt_count > policy.max_attempts {
        let until = add_saturating(now, policy.lockout());
        // Never move an existing block backwards
        let until = record.blocked_until.map_or(until, |prev| prev.max(until));
        record.blocked_until = Some(until);
        record.block_audited = true;
        let evaluation = AttemptEvaluation {
            outcome: AttemptOutcome::LimitExceeded,
            attempt_count: record.attempt_count,
            result: RateLimitResult::denied(until),
            lockout_expired: false,
            audit_due: true,
        };
        return (record, evaluation);
    }

    let evaluation = AttemptEvaluation {
        outcome: AttemptOutcome::Counted,
        attempt_count: record.attempt_count,
        result: RateLimitResult::allowed(
            policy.max_attempts - record.attempt_count,
            add_saturating(record.window_start, policy.window),
        ),
        lockout_expired: false,
        audit_due: false,
    };
    (record, evaluation)
}

/// Give back a block-event claim after its append failed.
///
/// Only releases the block the claim was taken for; a record that has
/// since moved on is returned unchanged. Returns whether the claim was
/// released.
pub fn release_block_audit(
    current: Option<RateLimitRecord>,
    blocked_until: DateTime<Utc>,
) -> (Option<RateLimitRecord>, bool) {
    match current {
        Some(mut record) if record.blocked_until == Some(blocked_until) => {
            record.block_audited = false;
            (Some(record), true)
        }
        other => (other, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{ActionType, Identifier};
    use chrono::{Duration, TimeZone};

    fn key() -> RateLimitKey {
        RateLimitKey::new(Identifier::from("ip:10.0.0.1"), ActionType::login())
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn policy() -> RateLimitPolicy {
        RateLimitPolicy::from_secs(3, 300)
    }

    #[test]
    fn test_every_event_type_has_a_risk_entry() {
        for kind in AuditEventType::ALL {
            assert!(
                RISK_TABLE.iter().any(|(k, _)| *k == kind),
                "missing risk entry for {kind}"
            );
        }
    }

    #[test]
    fn test_risk_mapping() {
        assert_eq!(
            risk_level_for(AuditEventType::RateLimitExceeded),
            RiskLevel::High
        );
        assert_eq!(risk_level_for(AuditEventType::LoginFailed), RiskLevel::Medium);
    }

    #[test]
    fn test_first_attempt_opens_window() {
        let (record, eval) = register_attempt(None, &key(), &policy(), at(0));
        assert_eq!(eval.outcome, AttemptOutcome::WindowStarted);
        assert!(!eval.lockout_expired);
        assert_eq!(record.attempt_count, 1);
        assert_eq!(record.window_start, at(0));
        assert!(eval.result.allowed);
        assert_eq!(eval.result.attempts_remaining, 2);
        assert_eq!(eval.result.reset_at, at(5));
    }

    #[test]
    fn test_counting_then_block() {
        let (r1, _) = register_attempt(None, &key(), &policy(), at(0));
        let (r2, e2) = register_attempt(Some(r1), &key(), &policy(), at(1));
        assert_eq!(e2.outcome, AttemptOutcome::Counted);
        assert_eq!(e2.result.attempts_remaining, 1);
        assert_eq!(e2.result.reset_at, at(5));

        let (r3, e3) = register_attempt(Some(r2), &key(), &policy(), at(2));
        assert_eq!(e3.result.attempts_remaining, 0);
        assert!(e3.result.allowed);

        let (r4, e4) = register_attempt(Some(r3), &key(), &policy(), at(3));
        assert_eq!(e4.outcome, AttemptOutcome::LimitExceeded);
        assert_eq!(e4.attempt_count, 4);
        assert!(!e4.result.allowed);
        assert_eq!(e4.result.blocked_until, Some(at(13)));
        assert_eq!(e4.result.reset_at, at(13));
        assert_eq!(r4.blocked_until, Some(at(13)));
    }

    fn blocked_record(block_audited: bool) -> RateLimitRecord {
        RateLimitRecord {
            identifier: Identifier::from("ip:10.0.0.1"),
            action_type: ActionType::login(),
            attempt_count: 4,
            window_start: at(0),
            blocked_until: Some(at(13)),
            block_audited,
        }
    }

    #[test]
    fn test_blocked_record_is_untouched() {
        let blocked = blocked_record(true);
        let (after, eval) = register_attempt(Some(blocked.clone()), &key(), &policy(), at(12));
        assert_eq!(eval.outcome, AttemptOutcome::Blocked);
        assert_eq!(after, blocked);
        assert!(!eval.audit_due);
        assert_eq!(eval.result.attempts_remaining, 0);
        assert_eq!(eval.result.blocked_until, Some(at(13)));
    }

    #[test]
    fn test_limit_exceeded_claims_block_event() {
        let (r1, _) = register_attempt(None, &key(), &policy(), at(0));
        assert!(!r1.block_audited);
        let (r2, _) = register_attempt(Some(r1), &key(), &policy(), at(0));
        let (r3, _) = register_attempt(Some(r2), &key(), &policy(), at(0));
        let (r4, e4) = register_attempt(Some(r3), &key(), &policy(), at(0));
        assert_eq!(e4.outcome, AttemptOutcome::LimitExceeded);
        assert!(e4.audit_due);
        assert!(r4.block_audited);

        let (_, e5) = register_attempt(Some(r4), &key(), &policy(), at(1));
        assert!(!e5.audit_due);
    }

    #[test]
    fn test_unaudited_block_is_claimed_once() {
        let (after, eval) = register_attempt(Some(blocked_record(false)), &key(), &policy(), at(12));
        assert_eq!(eval.outcome, AttemptOutcome::Blocked);
        assert!(eval.audit_due);
        assert!(after.block_audited);
        assert_eq!(after.attempt_count, 4);

        let (_, again) = register_attempt(Some(after), &key(), &policy(), at(12));
        assert!(!again.audit_due);
    }

    #[test]
    fn test_release_block_audit() {
        let (released, ok) = release_block_audit(Some(blocked_record(true)), at(13));
        assert!(ok);
        assert_eq!(released, Some(blocked_record(false)));

        // A different block is left alone
        let (kept, ok) = release_block_audit(Some(blocked_record(true)), at(20));
        assert!(!ok);
        assert_eq!(kept, Some(blocked_record(true)));

        let (none, ok) = release_block_audit(None, at(13));
        assert!(!ok);
        assert!(none.is_none());
    }

    #[test]
    fn test_block_expiry_resets() {
        let (after, eval) = register_attempt(Some(blocked_record(true)), &key(), &policy(), at(13));
        assert_eq!(eval.outcome, AttemptOutcome::WindowStarted);
        assert_eq!(after.attempt_count, 1);
        assert_eq!(after.blocked_until, None);
        assert!(!after.block_audited);
        assert!(eval.lockout_expired);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let (r1, _) = register_attempt(None, &key(), &policy(), at(0));
        // exactly one window later: stale
        let (_, eval) = register_attempt(Some(r1), &key(), &policy(), at(5));
        assert_eq!(eval.outcome, AttemptOutcome::WindowStarted);
    }

    #[test]
    fn test_clock_regression_resets() {
        let (r1, _) = register_attempt(None, &key(), &policy(), at(10));
        let (after, eval) = register_attempt(Some(r1), &key(), &policy(), at(9));
        assert_eq!(eval.outcome, AttemptOutcome::WindowStarted);
        assert_eq!(after.window_start, at(9));
        assert_eq!(eval.result.attempts_remaining, 2);
    }

    #[test]
    fn test_single_attempt_policy() {
        let policy = RateLimitPolicy::from_secs(1, 60);
        let (r1, e1) = register_attempt(None, &key(), &policy, at(0));
        assert!(e1.result.allowed);
        assert_eq!(e1.result.attempts_remaining, 0);
        let (_, e2) = register_attempt(Some(r1), &key(), &policy, at(0));
        assert_eq!(e2.outcome, AttemptOutcome::LimitExceeded);
        assert_eq!(e2.result.blocked_until, Some(at(2)));
    }
}
