//! In-Memory Repository Implementations
//!
//! Process-local store for single-instance deployments and tests.
//! Each record key is updated under its DashMap shard write lock.

use std::sync::RwLock;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::domain::entities::{AuditEvent, RateLimitRecord};
use crate::domain::repository::{AuditLogRepository, RateLimitRepository};
use crate::domain::value_objects::{AuditFilter, RateLimitKey};
use crate::error::{AccessError, AccessResult};

/// In-memory rate limit records and audit events
#[derive(Debug, Default)]
pub struct InMemoryAccessRepository {
    records: DashMap<RateLimitKey, RateLimitRecord>,
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAccessRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn event_count(&self) -> AccessResult<usize> {
        let events = self
            .events
            .read()
            .map_err(|_| AccessError::storage("audit log lock poisoned"))?;
        Ok(events.len())
    }
}

impl RateLimitRepository for InMemoryAccessRepository {
    async fn apply<F, T>(&self, key: &RateLimitKey, transition: F) -> AccessResult<T>
    where
        F: FnOnce(Option<RateLimitRecord>) -> (Option<RateLimitRecord>, T) + Send,
        T: Send,
    {
        // The entry guard holds the shard lock until the new record is stored
        let out = match self.records.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let (record, out) = transition(Some(entry.get().clone()));
                if let Some(record) = record {
                    entry.insert(record);
                }
                out
            }
            Entry::Vacant(entry) => {
                let (record, out) = transition(None);
                if let Some(record) = record {
                    entry.insert(record);
                }
                out
            }
        };
        Ok(out)
    }

    async fn find(&self, key: &RateLimitKey) -> AccessResult<Option<RateLimitRecord>> {
        Ok(self.records.get(key).map(|record| record.value().clone()))
    }
}

impl AuditLogRepository for InMemoryAccessRepository {
    async fn append(&self, event: &AuditEvent) -> AccessResult<()> {
        let mut events = self
            .events
            .write()
            .map_err(|_| AccessError::storage("audit log lock poisoned"))?;
        events.push(event.clone());
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> AccessResult<Vec<AuditEvent>> {
        let events = self
            .events
            .read()
            .map_err(|_| AccessError::storage("audit log lock poisoned"))?;

        // Latest append first, then a stable sort keeps that order for ties
        let mut matched: Vec<AuditEvent> = events
            .iter()
            .rev()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{ActionType, AuditDetail, Identifier};
    use chrono::{Duration, TimeZone, Utc};

    fn key() -> RateLimitKey {
        RateLimitKey::new(Identifier::from("account:7"), ActionType::login())
    }

    #[tokio::test]
    async fn test_apply_creates_then_updates() {
        let repo = InMemoryAccessRepository::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let seen = repo
            .apply(&key(), |current| {
                (Some(RateLimitRecord::start(&key(), now)), current.is_some())
            })
            .await
            .unwrap();
        assert!(!seen);

        let seen = repo
            .apply(&key(), |current| {
                let mut record = current.clone().unwrap();
                record.attempt_count += 1;
                (Some(record), current.is_some())
            })
            .await
            .unwrap();
        assert!(seen);

        let stored = repo.find(&key()).await.unwrap().unwrap();
        assert_eq!(stored.attempt_count, 2);
        assert_eq!(repo.record_count(), 1);
    }

    #[tokio::test]
    async fn test_apply_none_leaves_store_unchanged() {
        let repo = InMemoryAccessRepository::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        repo.apply(&key(), |_| (None, ())).await.unwrap();
        assert_eq!(repo.record_count(), 0);

        repo.apply(&key(), |_| (Some(RateLimitRecord::start(&key(), now)), ()))
            .await
            .unwrap();
        repo.apply(&key(), |_| (None, ())).await.unwrap();
        assert_eq!(repo.find(&key()).await.unwrap().unwrap().attempt_count, 1);
    }

    #[tokio::test]
    async fn test_find_missing() {
        let repo = InMemoryAccessRepository::new();
        assert!(repo.find(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_with_append_tiebreak() {
        let repo = InMemoryAccessRepository::new();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let failed = |n: &str| AuditDetail::ActionFailed {
            action_type: n.to_string(),
        };

        let first = AuditEvent::new(failed("login"), t0);
        let second = AuditEvent::new(failed("register"), t0);
        let older = AuditEvent::new(failed("login"), t0 - Duration::seconds(1));
        for event in [&first, &second, &older] {
            repo.append(event).await.unwrap();
        }

        let ids: Vec<_> = repo
            .query(&AuditFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id, older.id]);
        assert_eq!(repo.event_count().unwrap(), 3);
    }
}
