//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (RateLimitRecord, AuditEvent)
//! - Domain value objects (Identifier, ActionType, AuditFilter, Decision)
//! - Domain services (rate limit transition, risk classification)
//! - Repository traits (interfaces)

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
