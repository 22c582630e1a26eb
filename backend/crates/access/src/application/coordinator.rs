//! Access Policy Coordinator Use Case
//!
//! Entry point for handlers guarding a sensitive action:
//! 1. `guard` before the action runs (counts the attempt)
//! 2. the handler performs the action itself
//! 3. `record_outcome` afterwards (audits failures)
//!
//! Escalation on repeated failures comes from the limiter; the coordinator
//! never counts on its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kernel::id::AuditEventId;
use platform::password::{PasswordStrengthEvaluator, PasswordStrengthReport};
use platform::rate_limit::RateLimitPolicy;

use crate::application::audit_log::SecurityAuditLog;
use crate::application::config::AccessConfig;
use crate::application::rate_limiter::RateLimiter;
use crate::domain::entities::AuditEvent;
use crate::domain::repository::{AuditLogRepository, RateLimitRepository};
use crate::domain::value_objects::{
    ActionType, AuditDetail, Decision, DecisionReason, Identifier,
};
use crate::error::{AccessError, AccessResult};

/// Access policy coordinator
pub struct AccessPolicyCoordinator<R, A>
where
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    limiter: RateLimiter<R, A>,
    audit: SecurityAuditLog<A>,
    passwords: PasswordStrengthEvaluator,
    config: Arc<AccessConfig>,
}

impl<R, A> AccessPolicyCoordinator<R, A>
where
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    pub fn new(records: Arc<R>, audit: Arc<A>, config: Arc<AccessConfig>) -> Self {
        let audit = SecurityAuditLog::new(audit);
        Self {
            limiter: RateLimiter::new(records, audit.clone()),
            audit,
            passwords: PasswordStrengthEvaluator::new(config.password),
            config,
        }
    }

    /// Decide whether the attempt may proceed under `policy`
    pub async fn guard(
        &self,
        identifier: &Identifier,
        action_type: &ActionType,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> AccessResult<Decision> {
        if self.config.exempt_loopback && identifier.is_loopback() {
            tracing::trace!(identifier = %identifier, action_type = %action_type, "Loopback exempt");
            return Ok(Decision::exempt());
        }

        let result = self
            .limiter
            .check(identifier, action_type, policy, now)
            .await?;

        if result.allowed {
            Ok(Decision::within_limit(result.attempts_remaining))
        } else {
            Ok(Decision::rate_limited(result.blocked_until))
        }
    }

    /// `guard` with the policy configured for `action_type`
    pub async fn guard_action(
        &self,
        identifier: &Identifier,
        action_type: &ActionType,
        now: DateTime<Utc>,
    ) -> AccessResult<Decision> {
        let policy = self.config.policy_for(action_type);
        self.guard(identifier, action_type, &policy, now).await
    }

    /// `guard_action` that denies instead of failing
    pub async fn guard_fail_closed(
        &self,
        identifier: &Identifier,
        action_type: &ActionType,
        now: DateTime<Utc>,
    ) -> Decision {
        match self.guard_action(identifier, action_type, now).await {
            Ok(decision) => decision,
            Err(err) => {
                err.log();
                let reason = match err {
                    AccessError::InvalidPolicy(_) => DecisionReason::InvalidPolicy,
                    _ => DecisionReason::StorageUnavailable,
                };
                Decision::fail_closed(reason)
            }
        }
    }

    /// Report how the guarded action went. Failures are audited; the id of
    /// the new event is returned.
    pub async fn record_outcome(
        &self,
        identifier: &Identifier,
        action_type: &ActionType,
        succeeded: bool,
        now: DateTime<Utc>,
    ) -> AccessResult<Option<AuditEventId>> {
        if succeeded {
            tracing::debug!(identifier = %identifier, action_type = %action_type, "Action succeeded");
            return Ok(None);
        }

        let detail = AuditDetail::ActionFailed {
            action_type: action_type.to_string(),
        };
        let event = AuditEvent::new(detail, now).concerning(identifier);
        let id = self.audit.append(event).await?;
        Ok(Some(id))
    }

    /// Score a candidate password against the configured policy
    pub fn evaluate_password(&self, candidate: &str) -> PasswordStrengthReport {
        self.passwords.evaluate(candidate)
    }

    /// `Err(WeakPassword)` with feedback unless the candidate is valid
    pub fn ensure_strong_password(&self, candidate: &str) -> AccessResult<PasswordStrengthReport> {
        let report = self.evaluate_password(candidate);
        if report.valid {
            Ok(report)
        } else {
            Err(AccessError::WeakPassword {
                score: report.score,
                feedback: report.feedback,
            })
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter<R, A> {
        &self.limiter
    }

    pub fn audit_log(&self) -> &SecurityAuditLog<A> {
        &self.audit
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }
}
