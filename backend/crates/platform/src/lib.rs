//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations for the access-control
//! core:
//! - Rate limiting policy and result types
//! - Password strength evaluation (pure, deterministic)
//! - Environment-driven configuration helpers

pub mod config;
pub mod password;
pub mod rate_limit;
