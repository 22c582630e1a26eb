//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.

pub mod audit_log;
pub mod config;
pub mod coordinator;
pub mod rate_limiter;
