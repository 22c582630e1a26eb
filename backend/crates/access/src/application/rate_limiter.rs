//! Rate Limiter Use Case
//!
//! Sliding-window attempt counting with escalating lockout. The counting
//! itself runs inside the repository's atomic `apply`; this layer
//! validates the policy, logs, and audits new blocks.
//!
//! A block's RATE_LIMIT_EXCEEDED event is claimed on the record
//! (`block_audited`) in the same `apply` that counts the attempt. If the
//! append then fails the claim is released, so the next check against
//! the block writes the event instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::rate_limit::{RateLimitPolicy, RateLimitResult};

use crate::application::audit_log::SecurityAuditLog;
use crate::domain::entities::{AuditEvent, RateLimitRecord};
use crate::domain::repository::{AuditLogRepository, RateLimitRepository};
use crate::domain::services::{
    AttemptEvaluation, AttemptOutcome, register_attempt, release_block_audit,
};
use crate::domain::value_objects::{ActionType, AuditDetail, Identifier, RateLimitKey};
use crate::error::AccessResult;

/// Rate limiter over a record store and an audit log
pub struct RateLimiter<R, A>
where
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    records: Arc<R>,
    audit: SecurityAuditLog<A>,
}

impl<R, A> Clone for RateLimiter<R, A>
where
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            audit: self.audit.clone(),
        }
    }
}

impl<R, A> RateLimiter<R, A>
where
    R: RateLimitRepository,
    A: AuditLogRepository,
{
    pub fn new(records: Arc<R>, audit: SecurityAuditLog<A>) -> Self {
        Self { records, audit }
    }

    /// Count one attempt and decide whether it may proceed.
    ///
    /// A denial is returned as `allowed == false`, not as an error.
    /// Errors are `InvalidPolicy` (nothing stored) and `StorageUnavailable`.
    pub async fn check(
        &self,
        identifier: &Identifier,
        action_type: &ActionType,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> AccessResult<RateLimitResult> {
        policy.validate()?;

        let key = RateLimitKey::new(identifier.clone(), action_type.clone());
        let policy = *policy;
        let evaluation = self
            .records
            .apply(&key, |current| {
                let (record, evaluation) = register_attempt(current, &key, &policy, now);
                (Some(record), evaluation)
            })
            .await?;

        match evaluation.outcome {
            AttemptOutcome::LimitExceeded => {
                tracing::warn!(
                    identifier = %identifier,
                    action_type = %action_type,
                    attempt_count = evaluation.attempt_count,
                    limit = policy.max_attempts,
                    blocked_until = %evaluation.result.reset_at,
                    "Rate limit exceeded"
                );
            }
            AttemptOutcome::Blocked if evaluation.audit_due => {
                tracing::warn!(
                    identifier = %identifier,
                    action_type = %action_type,
                    blocked_until = %evaluation.result.reset_at,
                    "Writing block event missed by an earlier check"
                );
            }
            AttemptOutcome::Blocked => {
                tracing::debug!(
                    identifier = %identifier,
                    action_type = %action_type,
                    blocked_until = ?evaluation.result.blocked_until,
                    "Attempt while blocked"
                );
            }
            AttemptOutcome::WindowStarted if evaluation.lockout_expired => {
                tracing::info!(
                    identifier = %identifier,
                    action_type = %action_type,
                    "Lockout expired, window reset"
                );
            }
            AttemptOutcome::WindowStarted | AttemptOutcome::Counted => {
                tracing::debug!(
                    identifier = %identifier,
                    action_type = %action_type,
                    attempt_count = evaluation.attempt_count,
                    remaining = evaluation.result.attempts_remaining,
                    "Attempt counted"
                );
            }
        }

        if evaluation.audit_due {
            self.audit_block(&key, &evaluation, &policy, now).await?;
        }

        Ok(evaluation.result)
    }

    /// Write the RATE_LIMIT_EXCEEDED event claimed by `evaluation`,
    /// releasing the claim when the append fails.
    async fn audit_block(
        &self,
        key: &RateLimitKey,
        evaluation: &AttemptEvaluation,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> AccessResult<()> {
        let blocked_until = evaluation.result.reset_at;
        let detail = AuditDetail::RateLimitExceeded {
            action_type: key.action_type.to_string(),
            attempt_count: evaluation.attempt_count,
            limit: policy.max_attempts,
            blocked_until,
        };
        let event = AuditEvent::new(detail, now).concerning(&key.identifier);

        let Err(err) = self.audit.append(event).await else {
            return Ok(());
        };

        match self
            .records
            .apply(key, |current| release_block_audit(current, blocked_until))
            .await
        {
            Ok(released) => {
                tracing::warn!(
                    identifier = %key.identifier,
                    action_type = %key.action_type,
                    released,
                    "Block event not written, next check retries"
                );
            }
            Err(release_err) => {
                tracing::error!(
                    identifier = %key.identifier,
                    action_type = %key.action_type,
                    error = %release_err,
                    "Block event lost: claim could not be released"
                );
            }
        }
        Err(err)
    }

    /// Current record for (identifier, action type) without counting
    pub async fn status(
        &self,
        identifier: &Identifier,
        action_type: &ActionType,
    ) -> AccessResult<Option<RateLimitRecord>> {
        let key = RateLimitKey::new(identifier.clone(), action_type.clone());
        self.records.find(&key).await
    }

    pub fn audit_log(&self) -> &SecurityAuditLog<A> {
        &self.audit
    }
}
