//! Domain Value Objects
//!
//! Immutable value types for the access-control domain.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use derive_more::Display;
use platform::rate_limit::secs_until;
use serde::{Deserialize, Serialize};

use crate::domain::entities::AuditEvent;
use crate::domain::services::risk_level_for;
use crate::error::{AccessError, AccessResult};

// ============================================================================
// Identifier / ActionType / RateLimitKey
// ============================================================================

/// Subject being rate limited (source address, account id, ...)
///
/// Opaque to the core except for the `ip:` form, which also supplies the
/// source address recorded on audit events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{value}")]
pub struct Identifier {
    value: String,
}

impl Identifier {
    const IP_PREFIX: &'static str = "ip:";
    const ACCOUNT_PREFIX: &'static str = "account:";

    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// `ip:<addr>`
    pub fn ip(addr: IpAddr) -> Self {
        Self::new(format!("{}{}", Self::IP_PREFIX, addr))
    }

    /// `account:<id>`
    pub fn account(id: impl fmt::Display) -> Self {
        Self::new(format!("{}{}", Self::ACCOUNT_PREFIX, id))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Parsed address for `ip:` identifiers
    pub fn source_address(&self) -> Option<IpAddr> {
        self.value
            .strip_prefix(Self::IP_PREFIX)
            .and_then(|addr| addr.parse().ok())
    }

    pub fn is_loopback(&self) -> bool {
        self.source_address().is_some_and(|ip| ip.is_loopback())
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Label of an independently limited operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{value}")]
pub struct ActionType {
    value: String,
}

impl ActionType {
    pub const LOGIN: &'static str = "login";
    pub const REGISTER: &'static str = "register";
    pub const FORGOT_PASSWORD: &'static str = "forgot_password";
    pub const VERIFY_EMAIL: &'static str = "verify_email";

    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn login() -> Self {
        Self::new(Self::LOGIN)
    }

    pub fn register() -> Self {
        Self::new(Self::REGISTER)
    }

    pub fn forgot_password() -> Self {
        Self::new(Self::FORGOT_PASSWORD)
    }

    pub fn verify_email() -> Self {
        Self::new(Self::VERIFY_EMAIL)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Audit event type recorded when this action fails
    pub fn failure_event_type(&self) -> AuditEventType {
        match self.value.as_str() {
            Self::LOGIN => AuditEventType::LoginFailed,
            Self::REGISTER => AuditEventType::RegistrationFailed,
            Self::FORGOT_PASSWORD => AuditEventType::PasswordResetFailed,
            Self::VERIFY_EMAIL => AuditEventType::EmailVerificationFailed,
            _ => AuditEventType::ProtectedActionFailed,
        }
    }
}

impl From<&str> for ActionType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique key of a rate limit record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub identifier: Identifier,
    pub action_type: ActionType,
}

impl RateLimitKey {
    pub fn new(identifier: Identifier, action_type: ActionType) -> Self {
        Self {
            identifier,
            action_type,
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.identifier, self.action_type)
    }
}

// ============================================================================
// Risk level / Audit event type
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum RiskLevel {
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use RiskLevel::*;
        match self {
            Low => "LOW",
            Medium => "MEDIUM",
            High => "HIGH",
            Critical => "CRITICAL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.code() == code)
    }

    /// Risk assigned to an audit event type
    pub fn for_event(event_type: AuditEventType) -> Self {
        risk_level_for(event_type)
    }

    /// This level and every level above it
    pub fn at_least(self) -> impl Iterator<Item = RiskLevel> {
        Self::ALL.into_iter().filter(move |level| *level >= self)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownCode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    RateLimitExceeded,
    LoginFailed,
    RegistrationFailed,
    PasswordResetFailed,
    EmailVerificationFailed,
    ProtectedActionFailed,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 6] = [
        AuditEventType::RateLimitExceeded,
        AuditEventType::LoginFailed,
        AuditEventType::RegistrationFailed,
        AuditEventType::PasswordResetFailed,
        AuditEventType::EmailVerificationFailed,
        AuditEventType::ProtectedActionFailed,
    ];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use AuditEventType::*;
        match self {
            RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            LoginFailed => "LOGIN_FAILED",
            RegistrationFailed => "REGISTRATION_FAILED",
            PasswordResetFailed => "PASSWORD_RESET_FAILED",
            EmailVerificationFailed => "EMAIL_VERIFICATION_FAILED",
            ProtectedActionFailed => "PROTECTED_ACTION_FAILED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AuditEventType {
    type Err = UnknownCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownCode(s.to_string()))
    }
}

/// Unrecognised enum code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown code: {0}")]
pub struct UnknownCode(pub String);

// ============================================================================
// Audit detail
// ============================================================================

/// Typed payload of an audit event, one variant per event kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditDetail {
    RateLimitExceeded {
        action_type: String,
        attempt_count: u32,
        limit: u32,
        blocked_until: DateTime<Utc>,
    },
    ActionFailed {
        action_type: String,
    },
}

impl AuditDetail {
    pub fn event_type(&self) -> AuditEventType {
        match self {
            AuditDetail::RateLimitExceeded { .. } => AuditEventType::RateLimitExceeded,
            AuditDetail::ActionFailed { action_type } => {
                ActionType::new(action_type.as_str()).failure_event_type()
            }
        }
    }
}

// ============================================================================
// Audit query filter
// ============================================================================

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Audit query filter; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub event_type: Option<AuditEventType>,
    pub subject_id: Option<String>,
    pub time_range: Option<TimeRange>,
    pub min_risk: Option<RiskLevel>,
}

impl AuditFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: AuditEventType) -> Self {
        self.event_type = Some(event_type);
        self
    }

    pub fn subject_id(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn min_risk(mut self, level: RiskLevel) -> Self {
        self.min_risk = Some(level);
        self
    }

    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.event_type.is_none_or(|t| t == event.event_type)
            && self
                .subject_id
                .as_deref()
                .is_none_or(|s| event.subject_id.as_deref() == Some(s))
            && self.time_range.is_none_or(|r| r.contains(event.occurred_at))
            && self.min_risk.is_none_or(|min| event.risk_level >= min)
    }
}

// ============================================================================
// Decision
// ============================================================================

/// Why a guarded action was allowed or denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionReason {
    WithinLimit,
    /// Loopback source skipped the limiter
    Exempt,
    RateLimited,
    /// Fail-closed on storage failure
    StorageUnavailable,
    /// Fail-closed on a misconfigured policy
    InvalidPolicy,
}

impl DecisionReason {
    #[inline]
    pub const fn code(&self) -> &'static str {
        use DecisionReason::*;
        match self {
            WithinLimit => "within_limit",
            Exempt => "exempt",
            RateLimited => "rate_limited",
            StorageUnavailable => "storage_unavailable",
            InvalidPolicy => "invalid_policy",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of guarding a protected action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub attempts_remaining: u32,
    /// When a denied caller may try again (unknown for fail-closed denials)
    pub retry_at: Option<DateTime<Utc>>,
}

impl Decision {
    pub fn within_limit(attempts_remaining: u32) -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::WithinLimit,
            attempts_remaining,
            retry_at: None,
        }
    }

    pub fn exempt() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::Exempt,
            attempts_remaining: u32::MAX,
            retry_at: None,
        }
    }

    pub fn rate_limited(retry_at: Option<DateTime<Utc>>) -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::RateLimited,
            attempts_remaining: 0,
            retry_at,
        }
    }

    pub fn fail_closed(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
            attempts_remaining: 0,
            retry_at: None,
        }
    }

    /// `Err(RateLimited)` for a denial, for handlers that bail out with `?`
    pub fn ensure_allowed(self, now: DateTime<Utc>) -> AccessResult<Self> {
        if self.allowed {
            return Ok(self);
        }
        let retry_after_secs = self.retry_at.map(|at| secs_until(now, at));
        Err(AccessError::RateLimited {
            reason: self.reason,
            retry_at: self.retry_at,
            retry_after_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_identifier_forms() {
        let ip = Identifier::ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(ip.as_str(), "ip:10.0.0.1");
        assert_eq!(ip.source_address(), Some("10.0.0.1".parse().unwrap()));
        assert!(!ip.is_loopback());

        let account = Identifier::account(42);
        assert_eq!(account.to_string(), "account:42");
        assert_eq!(account.source_address(), None);

        assert!(Identifier::from("ip:127.0.0.1").is_loopback());
        assert!(Identifier::from("ip:::1").is_loopback());
        assert_eq!(Identifier::from("ip:not-an-ip").source_address(), None);
    }

    #[test]
    fn test_failure_event_types() {
        assert_eq!(
            ActionType::login().failure_event_type(),
            AuditEventType::LoginFailed
        );
        assert_eq!(
            ActionType::register().failure_event_type(),
            AuditEventType::RegistrationFailed
        );
        assert_eq!(
            ActionType::forgot_password().failure_event_type(),
            AuditEventType::PasswordResetFailed
        );
        assert_eq!(
            ActionType::verify_email().failure_event_type(),
            AuditEventType::EmailVerificationFailed
        );
        assert_eq!(
            ActionType::from("export_data").failure_event_type(),
            AuditEventType::ProtectedActionFailed
        );
    }

    #[test]
    fn test_codes_round_trip() {
        for kind in AuditEventType::ALL {
            assert_eq!(AuditEventType::from_code(kind.code()), Some(kind));
        }
        for level in RiskLevel::ALL {
            assert_eq!(RiskLevel::from_code(level.code()), Some(level));
        }
        assert_eq!(RiskLevel::from_code("SEVERE"), None);
        assert_eq!("HIGH".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert_eq!(
            "LOGIN_FAILED".parse::<AuditEventType>(),
            Ok(AuditEventType::LoginFailed)
        );
        assert!("login_failed".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        let levels: Vec<_> = RiskLevel::High.at_least().collect();
        assert_eq!(levels, vec![RiskLevel::High, RiskLevel::Critical]);
    }

    #[test]
    fn test_detail_serialization_is_tagged() {
        let detail = AuditDetail::ActionFailed {
            action_type: "login".to_string(),
        };
        let json = serde_json::to_string(&detail).unwrap();
        assert_eq!(json, r#"{"kind":"action_failed","action_type":"login"}"#);

        let back: AuditDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), AuditEventType::LoginFailed);
    }

    #[test]
    fn test_ensure_allowed() {
        let now = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        assert!(Decision::within_limit(2).ensure_allowed(now).is_ok());

        let denied = Decision::rate_limited(Some(now + chrono::Duration::milliseconds(1_500)));
        match denied.ensure_allowed(now) {
            Err(AccessError::RateLimited {
                reason,
                retry_after_secs,
                ..
            }) => {
                assert_eq!(reason, DecisionReason::RateLimited);
                assert_eq!(retry_after_secs, Some(2));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }

        let closed = Decision::fail_closed(DecisionReason::StorageUnavailable);
        assert!(matches!(
            closed.ensure_allowed(now),
            Err(AccessError::RateLimited {
                retry_after_secs: None,
                ..
            })
        ));
    }

    #[test]
    fn test_time_range_is_half_open() {
        let start = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let end = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();
        let range = TimeRange::new(start, end);
        assert!(range.contains(start));
        assert!(!range.contains(end));
    }
}
