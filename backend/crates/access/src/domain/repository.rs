//! Repository Traits
//!
//! Interfaces for data persistence. Implementations are in the infra layer.

use crate::domain::entities::{AuditEvent, RateLimitRecord};
use crate::domain::value_objects::{AuditFilter, RateLimitKey};
use crate::error::AccessResult;

/// Rate limit record repository trait
#[trait_variant::make(RateLimitRepository: Send)]
pub trait LocalRateLimitRepository {
    /// Atomic read-modify-write of the record stored under `key`
    ///
    /// `transition` receives the current record (None if absent) and returns
    /// the record to store (None leaves the store as it was) plus a value
    /// handed back to the caller. No other writer may observe or modify the
    /// record between the read and the write.
    async fn apply<F, T>(&self, key: &RateLimitKey, transition: F) -> AccessResult<T>
    where
        F: FnOnce(Option<RateLimitRecord>) -> (Option<RateLimitRecord>, T) + Send,
        T: Send;

    /// Read-only lookup
    async fn find(&self, key: &RateLimitKey) -> AccessResult<Option<RateLimitRecord>>;
}

/// Append-only audit event repository trait
#[trait_variant::make(AuditLogRepository: Send)]
pub trait LocalAuditLogRepository {
    /// Persist a new event; events are never updated or deleted
    async fn append(&self, event: &AuditEvent) -> AccessResult<()>;

    /// Events matching `filter`, newest first
    async fn query(&self, filter: &AuditFilter) -> AccessResult<Vec<AuditEvent>>;
}
