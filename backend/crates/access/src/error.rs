//! Access Error Types
//!
//! This module provides access-control error variants that integrate
//! with the unified `kernel::error::AppError` system.

use chrono::{DateTime, Utc};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::rate_limit::PolicyError;
use thiserror::Error;

use crate::domain::value_objects::DecisionReason;

/// Access-control result type alias
pub type AccessResult<T> = Result<T, AccessError>;

/// Access-control error variants
///
/// A rate limit denial is normally a value (`RateLimitResult`, `Decision`);
/// `RateLimited` only exists for handlers that want to bail out with `?`.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Policy rejected before any storage access
    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    /// Store could not be read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Password below the configured strength threshold
    #[error("Password is too weak (score {score})")]
    WeakPassword { score: u8, feedback: Vec<String> },

    /// Guarded action denied
    #[error("Action denied: {reason}")]
    RateLimited {
        reason: DecisionReason,
        retry_at: Option<DateTime<Utc>>,
        retry_after_secs: Option<u64>,
    },
}

impl AccessError {
    pub fn storage(message: impl Into<String>) -> Self {
        AccessError::StorageUnavailable(message.into())
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::InvalidPolicy(_) => ErrorKind::InternalServerError,
            AccessError::StorageUnavailable(_) => ErrorKind::ServiceUnavailable,
            AccessError::WeakPassword { .. } => ErrorKind::BadRequest,
            AccessError::RateLimited { reason, .. } => match reason {
                DecisionReason::StorageUnavailable => ErrorKind::ServiceUnavailable,
                DecisionReason::InvalidPolicy => ErrorKind::InternalServerError,
                _ => ErrorKind::TooManyRequests,
            },
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            AccessError::InvalidPolicy(e) => {
                tracing::error!(error = %e, "Access policy misconfigured");
            }
            AccessError::StorageUnavailable(msg) => {
                tracing::error!(message = %msg, "Access storage unavailable");
            }
            AccessError::RateLimited { reason, retry_at, .. } => {
                tracing::warn!(reason = %reason, retry_at = ?retry_at, "Access denied");
            }
            AccessError::WeakPassword { score, .. } => {
                tracing::debug!(score, "Weak password rejected");
            }
        }
    }
}

impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "Access database error");
        AccessError::StorageUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!(error = %err, "Audit detail encoding error");
        AccessError::StorageUnavailable(format!("audit detail encoding: {err}"))
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        match err {
            AccessError::WeakPassword { feedback, .. } => AppError::bad_request(message)
                .with_details(feedback)
                .with_action("Choose a longer password mixing letters, digits and symbols"),
            AccessError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => AppError::new(kind, message)
                .with_retry_after(secs)
                .with_action("Please try again later"),
            AccessError::StorageUnavailable(_) => {
                // Store details stay in the logs
                AppError::service_unavailable("Service temporarily unavailable").with_source(err)
            }
            AccessError::InvalidPolicy(_) => AppError::internal(message).with_source(err),
            other => AppError::new(kind, message).with_source(other),
        }
    }
}
