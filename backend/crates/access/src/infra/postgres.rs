//! PostgreSQL Repository Implementations

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use kernel::id::AuditEventId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{AuditEvent, RateLimitRecord};
use crate::domain::repository::{AuditLogRepository, RateLimitRepository};
use crate::domain::value_objects::{
    ActionType, AuditDetail, AuditEventType, AuditFilter, Identifier, RateLimitKey, RiskLevel,
};
use crate::error::{AccessError, AccessResult};

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgAccessRepository {
    pool: PgPool,
}

impl PgAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RateLimitRepository for PgAccessRepository {
    async fn apply<F, T>(&self, key: &RateLimitKey, transition: F) -> AccessResult<T>
    where
        F: FnOnce(Option<RateLimitRecord>) -> (Option<RateLimitRecord>, T) + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;

        // Make sure a row exists so FOR UPDATE always has something to lock.
        // attempt_count = 0 marks a placeholder that was never counted.
        sqlx::query(
            r#"
            INSERT INTO rate_limit_records (identifier, action_type, attempt_count, window_start)
            VALUES ($1, $2, 0, to_timestamp(0))
            ON CONFLICT (identifier, action_type) DO NOTHING
            "#,
        )
        .bind(key.identifier.as_str())
        .bind(key.action_type.as_str())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, RateLimitRow>(
            r#"
            SELECT identifier, action_type, attempt_count, window_start, blocked_until,
                   block_audited
            FROM rate_limit_records
            WHERE identifier = $1 AND action_type = $2
            FOR UPDATE
            "#,
        )
        .bind(key.identifier.as_str())
        .bind(key.action_type.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let (record, out) = transition(row.into_record());

        if let Some(record) = record {
            sqlx::query(
                r#"
                UPDATE rate_limit_records
                SET attempt_count = $3,
                    window_start = $4,
                    blocked_until = $5,
                    block_audited = $6,
                    updated_at = now()
                WHERE identifier = $1 AND action_type = $2
                "#,
            )
            .bind(record.identifier.as_str())
            .bind(record.action_type.as_str())
            .bind(i64::from(record.attempt_count))
            .bind(record.window_start)
            .bind(record.blocked_until)
            .bind(record.block_audited)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(out)
    }

    async fn find(&self, key: &RateLimitKey) -> AccessResult<Option<RateLimitRecord>> {
        let row = sqlx::query_as::<_, RateLimitRow>(
            r#"
            SELECT identifier, action_type, attempt_count, window_start, blocked_until,
                   block_audited
            FROM rate_limit_records
            WHERE identifier = $1 AND action_type = $2
            "#,
        )
        .bind(key.identifier.as_str())
        .bind(key.action_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(RateLimitRow::into_record))
    }
}

impl AuditLogRepository for PgAccessRepository {
    async fn append(&self, event: &AuditEvent) -> AccessResult<()> {
        let detail = serde_json::to_string(&event.detail)?;

        sqlx::query(
            r#"
            INSERT INTO security_audit_events (
                event_id,
                event_type,
                subject_id,
                source_address,
                detail,
                risk_level,
                occurred_at
            ) VALUES ($1, $2, $3, $4::inet, $5::jsonb, $6, $7)
            "#,
        )
        .bind(event.id.into_uuid())
        .bind(event.event_type.code())
        .bind(event.subject_id.as_deref())
        .bind(event.source_address.map(|ip| ip.to_string()))
        .bind(detail)
        .bind(event.risk_level.code())
        .bind(event.occurred_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Audit event stored");
        Ok(())
    }

    async fn query(&self, filter: &AuditFilter) -> AccessResult<Vec<AuditEvent>> {
        let risk_levels: Option<Vec<String>> = filter
            .min_risk
            .map(|min| min.at_least().map(|level| level.code().to_string()).collect());

        let rows = sqlx::query_as::<_, AuditEventRow>(
            r#"
            SELECT
                event_id,
                event_type,
                subject_id,
                host(source_address) AS source_address,
                detail::TEXT AS detail,
                risk_level,
                occurred_at
            FROM security_audit_events
            WHERE ($1::TEXT IS NULL OR event_type = $1)
              AND ($2::TEXT IS NULL OR subject_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR occurred_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR occurred_at < $4)
              AND ($5::TEXT[] IS NULL OR risk_level = ANY($5))
            ORDER BY occurred_at DESC, seq DESC
            "#,
        )
        .bind(filter.event_type.map(|t| t.code()))
        .bind(filter.subject_id.as_deref())
        .bind(filter.time_range.map(|r| r.start))
        .bind(filter.time_range.map(|r| r.end))
        .bind(risk_levels)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEventRow::into_event).collect()
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct RateLimitRow {
    identifier: String,
    action_type: String,
    attempt_count: i64,
    window_start: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
    block_audited: bool,
}

impl RateLimitRow {
    /// Placeholder rows (never counted) read as absent
    fn into_record(self) -> Option<RateLimitRecord> {
        if self.attempt_count <= 0 {
            return None;
        }
        Some(RateLimitRecord {
            identifier: Identifier::new(self.identifier),
            action_type: ActionType::new(self.action_type),
            attempt_count: u32::try_from(self.attempt_count).unwrap_or(u32::MAX),
            window_start: self.window_start,
            blocked_until: self.blocked_until,
            block_audited: self.block_audited,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    event_id: Uuid,
    event_type: String,
    subject_id: Option<String>,
    source_address: Option<String>,
    detail: String,
    risk_level: String,
    occurred_at: DateTime<Utc>,
}

impl AuditEventRow {
    fn into_event(self) -> AccessResult<AuditEvent> {
        let event_type = AuditEventType::from_code(&self.event_type).ok_or_else(|| {
            AccessError::storage(format!("unknown audit event type {:?}", self.event_type))
        })?;
        let risk_level = RiskLevel::from_code(&self.risk_level).ok_or_else(|| {
            AccessError::storage(format!("unknown risk level {:?}", self.risk_level))
        })?;
        let detail: AuditDetail = serde_json::from_str(&self.detail)?;
        let source_address = self
            .source_address
            .map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|_| AccessError::storage(format!("malformed source address {s:?}")))
            })
            .transpose()?;

        Ok(AuditEvent {
            id: AuditEventId::from_uuid(self.event_id),
            event_type,
            subject_id: self.subject_id,
            source_address,
            detail,
            risk_level,
            occurred_at: self.occurred_at,
        })
    }
}
