//! Domain Entities
//!
//! Core entities for the access-control domain.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use kernel::id::AuditEventId;

use crate::domain::services::risk_level_for;
use crate::domain::value_objects::{
    ActionType, AuditDetail, AuditEventType, Identifier, RateLimitKey, RiskLevel,
};

/// Attempt counter for one (identifier, action type) pair
///
/// Created on the first attempt, reset in place when its window lapses,
/// never deleted by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub identifier: Identifier,
    pub action_type: ActionType,
    pub attempt_count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
    /// The current block's RATE_LIMIT_EXCEEDED event is written or claimed
    pub block_audited: bool,
}

impl RateLimitRecord {
    /// A fresh window holding the first attempt
    pub fn start(key: &RateLimitKey, now: DateTime<Utc>) -> Self {
        Self {
            identifier: key.identifier.clone(),
            action_type: key.action_type.clone(),
            attempt_count: 1,
            window_start: now,
            blocked_until: None,
            block_audited: false,
        }
    }

    pub fn key(&self) -> RateLimitKey {
        RateLimitKey::new(self.identifier.clone(), self.action_type.clone())
    }

    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now < until)
    }

    /// Window lapsed, or started in the future (clock regression)
    pub fn window_stale_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.window_start > now || now - self.window_start >= window
    }
}

/// Immutable security audit event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub event_type: AuditEventType,
    pub subject_id: Option<String>,
    pub source_address: Option<IpAddr>,
    pub detail: AuditDetail,
    pub risk_level: RiskLevel,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    /// New event; type and risk level are derived from the detail
    pub fn new(detail: AuditDetail, occurred_at: DateTime<Utc>) -> Self {
        let event_type = detail.event_type();
        Self {
            id: AuditEventId::new(),
            event_type,
            subject_id: None,
            source_address: None,
            detail,
            risk_level: risk_level_for(event_type),
            occurred_at,
        }
    }

    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn with_source_address(mut self, source_address: Option<IpAddr>) -> Self {
        self.source_address = source_address;
        self
    }

    /// Subject and source address taken from a rate limit identifier
    pub fn concerning(self, identifier: &Identifier) -> Self {
        self.with_subject(identifier.as_str())
            .with_source_address(identifier.source_address())
    }
}
