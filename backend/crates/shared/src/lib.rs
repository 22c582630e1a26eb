//! Shared Kernel - Domain-crossing minimal core
//!
//! This crate contains the vocabulary shared by the access-control crates:
//! - Common error types and result aliases
//! - Typed ID wrappers
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all domains.

pub mod error {
    pub mod app_error;
    pub mod kind;
}
pub mod id;
