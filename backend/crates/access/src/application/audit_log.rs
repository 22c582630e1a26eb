//! Security Audit Log Use Case
//!
//! Append-only record of security-relevant events.

use std::sync::Arc;

use kernel::id::AuditEventId;

use crate::domain::entities::AuditEvent;
use crate::domain::repository::AuditLogRepository;
use crate::domain::value_objects::{AuditFilter, RiskLevel};
use crate::error::AccessResult;

/// Security audit log
pub struct SecurityAuditLog<A>
where
    A: AuditLogRepository,
{
    repo: Arc<A>,
}

impl<A> Clone for SecurityAuditLog<A>
where
    A: AuditLogRepository,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<A> SecurityAuditLog<A>
where
    A: AuditLogRepository,
{
    pub fn new(repo: Arc<A>) -> Self {
        Self { repo }
    }

    /// Persist `event` and return its id. Failures propagate unchanged.
    pub async fn append(&self, event: AuditEvent) -> AccessResult<AuditEventId> {
        self.repo.append(&event).await?;

        let subject = event.subject_id.as_deref().unwrap_or("-");
        match event.risk_level {
            RiskLevel::Critical => tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                subject,
                "Security event recorded"
            ),
            RiskLevel::High => tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                subject,
                "Security event recorded"
            ),
            RiskLevel::Medium => tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                subject,
                "Security event recorded"
            ),
            RiskLevel::Low => tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                subject,
                "Security event recorded"
            ),
        }

        Ok(event.id)
    }

    /// Matching events, newest first
    pub async fn query(&self, filter: &AuditFilter) -> AccessResult<Vec<AuditEvent>> {
        self.repo.query(filter).await
    }
}
