//! Error Kind - Classification of errors
//!
//! Defines the [`ErrorKind`] enum that host applications map onto their
//! transport (HTTP status codes in the platform backend).

use serde::Serialize;

/// エラー種別の列挙体
///
/// Classifies failures coming out of the access-control core so the host
/// can pick a response without matching on crate-specific error enums.
///
/// ## Examples
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// let kind = ErrorKind::TooManyRequests;
/// assert_eq!(kind.status_code(), 429);
/// assert_eq!(kind.as_str(), "Too Many Requests");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// 400 - Bad Request: 入力が不正 (e.g. weak password)
    BadRequest,
    /// 429 - Too Many Requests: レート制限超過
    TooManyRequests,
    /// 500 - Internal Server Error: 呼び出し側のバグ (e.g. invalid policy)
    InternalServerError,
    /// 503 - Service Unavailable: ストレージ利用不可
    ServiceUnavailable,
}

impl ErrorKind {
    /// HTTP status code for this kind
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Standard reason phrase
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::TooManyRequests => "Too Many Requests",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// サーバー側のエラーかどうかを判定
    ///
    /// 5xx kinds should be logged at error level by the host.
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Whether a client may retry the same request later
    ///
    /// Rate limiting and storage outages are transient; the rest are not.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TooManyRequests | ErrorKind::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::BadRequest.status_code(), 400);
        assert_eq!(ErrorKind::TooManyRequests.status_code(), 429);
        assert_eq!(ErrorKind::InternalServerError.status_code(), 500);
        assert_eq!(ErrorKind::ServiceUnavailable.status_code(), 503);
    }

    #[test]
    fn test_is_server_error() {
        assert!(!ErrorKind::TooManyRequests.is_server_error());
        assert!(ErrorKind::InternalServerError.is_server_error());
        assert!(ErrorKind::ServiceUnavailable.is_server_error());
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::TooManyRequests.is_retryable());
        assert!(ErrorKind::ServiceUnavailable.is_retryable());
        assert!(!ErrorKind::BadRequest.is_retryable());
        assert!(!ErrorKind::InternalServerError.is_retryable());
    }

    #[test]
    fn test_serialize_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::TooManyRequests).unwrap();
        assert_eq!(json, "\"TOO_MANY_REQUESTS\"");
    }
}
