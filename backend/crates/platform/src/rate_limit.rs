//! Rate Limiting Infrastructure
//!
//! Policy and result types shared by every rate limit store.
//! The window/lockout arithmetic lives here so the stores only have to
//! provide atomic read-modify-write of a single record.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Longest accepted window (365 days)
pub const MAX_WINDOW_SECS: i64 = 365 * 24 * 3600;

/// Block duration as a multiple of the window once the limit is exceeded
pub const LOCKOUT_MULTIPLIER: i32 = 2;

/// Rejected rate limit policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("max_attempts must be greater than zero")]
    ZeroAttempts,

    #[error("window must be positive (got {actual_ms} ms)")]
    NonPositiveWindow { actual_ms: i64 },

    #[error("window must be at most {max_secs} seconds (got {actual_secs})")]
    WindowTooLong { max_secs: i64, actual_secs: i64 },
}

/// Rate limit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Maximum attempts allowed in the window
    pub max_attempts: u32,
    /// Time window duration
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
        }
    }

    pub fn from_secs(max_attempts: u32, window_secs: i64) -> Self {
        Self::new(max_attempts, Duration::seconds(window_secs))
    }

    /// Check the policy before it is used against a store
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if self.window <= Duration::zero() {
            return Err(PolicyError::NonPositiveWindow {
                actual_ms: self.window.num_milliseconds(),
            });
        }
        if self.window.num_seconds() > MAX_WINDOW_SECS {
            return Err(PolicyError::WindowTooLong {
                max_secs: MAX_WINDOW_SECS,
                actual_secs: self.window.num_seconds(),
            });
        }
        Ok(())
    }

    /// Block duration applied when the limit is exceeded
    ///
    /// Saturates instead of overflowing for windows that never passed
    /// `validate`.
    pub fn lockout(&self) -> Duration {
        self.window
            .checked_mul(LOCKOUT_MULTIPLIER)
            .unwrap_or(if self.window < Duration::zero() {
                Duration::min_value()
            } else {
                Duration::max_value()
            })
    }
}

/// Rate limit check result
///
/// A denial is an ordinary value, not an error: it carries the instant the
/// caller may try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub attempts_remaining: u32,
    pub blocked_until: Option<DateTime<Utc>>,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitResult {
    pub fn allowed(attempts_remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            attempts_remaining,
            blocked_until: None,
            reset_at,
        }
    }

    pub fn denied(blocked_until: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            attempts_remaining: 0,
            blocked_until: Some(blocked_until),
            reset_at: blocked_until,
        }
    }

    /// Seconds until the caller may retry, rounded up; zero when allowed
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        match self.blocked_until.filter(|_| !self.allowed) {
            Some(until) => secs_until(now, until),
            None => 0,
        }
    }
}

/// Whole seconds from `now` to `until`, rounded up; zero once `until` passed
pub fn secs_until(now: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
    let ms = (until - now).num_milliseconds();
    if ms <= 0 { 0 } else { (ms / 1000 + i64::from(ms % 1000 != 0)) as u64 }
}

/// `now + delta`, clamped to the largest representable instant
pub fn add_saturating(now: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    now.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_preset_policy_is_valid() {
        assert!(RateLimitPolicy::from_secs(5, 300).validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let policy = RateLimitPolicy::from_secs(0, 60);
        assert_eq!(policy.validate(), Err(PolicyError::ZeroAttempts));
    }

    #[test]
    fn test_non_positive_window_rejected() {
        let policy = RateLimitPolicy::from_secs(3, 0);
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::NonPositiveWindow { actual_ms: 0 })
        ));

        let policy = RateLimitPolicy::new(3, Duration::seconds(-5));
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::NonPositiveWindow { .. })
        ));
    }

    #[test]
    fn test_oversized_window_rejected() {
        let policy = RateLimitPolicy::from_secs(3, MAX_WINDOW_SECS + 1);
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::WindowTooLong { .. })
        ));
        assert!(RateLimitPolicy::from_secs(3, MAX_WINDOW_SECS).validate().is_ok());
    }

    #[test]
    fn test_lockout_is_double_window() {
        let policy = RateLimitPolicy::from_secs(3, 300);
        assert_eq!(policy.lockout(), Duration::seconds(600));
    }

    #[test]
    fn test_lockout_saturates_on_unvalidated_window() {
        let huge = RateLimitPolicy::new(3, Duration::max_value());
        assert_eq!(huge.lockout(), Duration::max_value());

        let negative = RateLimitPolicy::new(3, Duration::min_value());
        assert_eq!(negative.lockout(), Duration::min_value());
    }

    #[test]
    fn test_secs_until() {
        let now = t0();
        assert_eq!(secs_until(now, now), 0);
        assert_eq!(secs_until(now, now - Duration::seconds(3)), 0);
        assert_eq!(secs_until(now, now + Duration::milliseconds(1)), 1);
        assert_eq!(secs_until(now, now + Duration::seconds(600)), 600);
        assert_eq!(secs_until(now, now + Duration::milliseconds(600_001)), 601);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let now = t0();
        let result = RateLimitResult::denied(now + Duration::milliseconds(1500));
        assert_eq!(result.retry_after(now), 2);
        assert_eq!(result.retry_after(now + Duration::seconds(5)), 0);

        let allowed = RateLimitResult::allowed(2, now + Duration::seconds(60));
        assert_eq!(allowed.retry_after(now), 0);
    }

    #[test]
    fn test_add_saturating() {
        let now = t0();
        assert_eq!(add_saturating(now, Duration::seconds(1)), now + Duration::seconds(1));
        assert_eq!(
            add_saturating(DateTime::<Utc>::MAX_UTC, Duration::seconds(1)),
            DateTime::<Utc>::MAX_UTC
        );
    }
}
