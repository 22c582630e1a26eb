//! Application Error - Unified error type for the host application
//!
//! Defines [`AppError`] struct and [`AppResult<T>`] type alias.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use super::kind::ErrorKind;

/// アプリケーション統一エラー型
///
/// Crate-specific errors (such as the access-control `AccessError`) convert
/// into this type at the boundary to the host application.
///
/// ## Fields
/// * `kind` - classification, mapped to a transport status by the host
/// * `message` - user-facing message
/// * `action` - what the user should do next (optional)
/// * `details` - ordered user-facing details, e.g. password feedback
/// * `retry_after_secs` - how long the client should wait (optional)
/// * `source` - original error, for debugging only
///
/// ## Examples
/// ```rust
/// use kernel::error::app_error::AppError;
///
/// use kernel::error::kind::ErrorKind;
///
/// let err = AppError::new(ErrorKind::TooManyRequests, "Too many login attempts")
///     .with_retry_after(600)
///     .with_action("Please try again later");
/// assert_eq!(err.retry_after_secs(), Some(600));
/// ```
pub struct AppError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    action: Option<Cow<'static, str>>,
    details: Vec<String>,
    retry_after_secs: Option<u64>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// `Result<T, AppError>` の省略形
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    // ========================================================================
    // Constructors
    // ========================================================================

    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
            details: Vec::new(),
            retry_after_secs: None,
            source: None,
        }
    }

    /// 400 Bad Request エラー
    #[inline]
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// 500 Internal Server Error
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    /// 503 Service Unavailable エラー
    #[inline]
    pub fn service_unavailable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// ユーザー向けアクションを設定
    #[inline]
    pub fn with_action(mut self, action: impl Into<Cow<'static, str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Attach ordered user-facing details
    #[inline]
    pub fn with_details(mut self, details: impl IntoIterator<Item = String>) -> Self {
        self.details.extend(details);
        self
    }

    /// Attach the number of seconds the client should wait before retrying
    #[inline]
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    /// 元のエラーを設定（デバッグ用）
    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    #[inline]
    pub fn details(&self) -> &[String] {
        &self.details
    }

    #[inline]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after_secs
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.kind.is_server_error()
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("AppError");
        builder.field("kind", &self.kind);
        builder.field("message", &self.message);
        if let Some(action) = &self.action {
            builder.field("action", action);
        }
        if !self.details.is_empty() {
            builder.field("details", &self.details);
        }
        if let Some(secs) = self.retry_after_secs {
            builder.field("retry_after_secs", &secs);
        }
        if let Some(source) = &self.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(action) = &self.action {
            write!(f, " (Action: {})", action)?;
        }
        Ok(())
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}
