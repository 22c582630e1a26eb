//! Configuration Helpers
//!
//! Typed reads of environment-style settings. Values are looked up through
//! a caller-supplied function so the same parsing runs against the process
//! environment in production and a fixed map in tests.

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Value present but not parseable
    #[error("{key}: cannot parse {value:?} ({reason})")]
    Unparseable {
        key: String,
        value: String,
        reason: String,
    },

    /// Value parsed but rejected by validation
    #[error("{key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Look up a variable from the process environment.
///
/// A `.env` file in the working directory (or its parents) is loaded on the
/// first call; variables already set in the environment take precedence.
pub fn env_lookup(key: &str) -> Option<String> {
    dotenvy::var(key).ok()
}

/// Read and parse `key`, falling back to `default` when it is unset or blank
pub fn parse_or<T, L>(lookup: &L, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    L: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::Unparseable {
                    key: key.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })
        }
        _ => {
            tracing::trace!(key, "Config value not set, using default");
            Ok(default)
        }
    }
}

/// Read a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn flag_or<L>(lookup: &L, key: &str, default: bool) -> Result<bool, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Unparseable {
            key: key.to_string(),
            value: raw,
            reason: "expected a boolean".to_string(),
        }),
    }
}
