//! Access-Control Core
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, the rate limit transition, repository traits
//! - `application/` - RateLimiter, SecurityAuditLog, AccessPolicyCoordinator, config
//! - `infra/` - In-memory and PostgreSQL repositories
//!
//! ## Security Model
//! - Every check is one atomic read-modify-write of a single record
//! - Exceeding the limit blocks the key for twice the window
//! - Blocks are audited once, when they are installed
//! - Storage failures are errors; callers deny (or use `guard_fail_closed`)
//! - Time is always passed in; nothing here reads the clock

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::audit_log::SecurityAuditLog;
pub use application::config::AccessConfig;
pub use application::coordinator::AccessPolicyCoordinator;
pub use application::rate_limiter::RateLimiter;
pub use error::{AccessError, AccessResult};
pub use infra::memory::InMemoryAccessRepository;
pub use infra::postgres::PgAccessRepository;

pub use platform::password::{
    PasswordPolicy, PasswordStrengthEvaluator, PasswordStrengthReport, evaluate,
};
pub use platform::rate_limit::{RateLimitPolicy, RateLimitResult};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::entities::*;
    pub use crate::domain::value_objects::*;
}
