//! Application Configuration
//!
//! Per-action rate limit presets, password policy and exemptions.
//! Built once at start-up and shared as `Arc<AccessConfig>`.

use std::collections::HashMap;

use platform::config::{ConfigError, env_lookup, flag_or, parse_or};
use platform::password::{MIN_PASSWORD_LENGTH, PasswordPolicy};
use platform::rate_limit::{MAX_WINDOW_SECS, RateLimitPolicy};

use crate::domain::value_objects::ActionType;

const ENV_PREFIX: &str = "ACCESS";

/// Access-control configuration
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Rate limit policy per action type
    pub policies: HashMap<ActionType, RateLimitPolicy>,
    /// Policy for action types without a preset
    pub fallback_policy: RateLimitPolicy,
    /// Password strength policy
    pub password: PasswordPolicy,
    /// Skip the limiter for loopback `ip:` identifiers
    pub exempt_loopback: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        let policies = Self::presets()
            .into_iter()
            .map(|(action, max, secs)| {
                (
                    ActionType::new(action),
                    RateLimitPolicy::from_secs(max, secs),
                )
            })
            .collect();
        Self {
            policies,
            fallback_policy: RateLimitPolicy::from_secs(60, 60),
            password: PasswordPolicy::default(),
            exempt_loopback: false,
        }
    }
}

impl AccessConfig {
    /// (action, max attempts, window seconds)
    fn presets() -> [(&'static str, u32, i64); 4] {
        [
            (ActionType::LOGIN, 5, 300),
            (ActionType::REGISTER, 3, 300),
            (ActionType::FORGOT_PASSWORD, 3, 3600),
            (ActionType::VERIFY_EMAIL, 10, 3600),
        ]
    }

    /// Policy configured for `action`, or the fallback
    pub fn policy_for(&self, action: &ActionType) -> RateLimitPolicy {
        self.policies
            .get(action)
            .copied()
            .unwrap_or(self.fallback_policy)
    }

    pub fn with_policy(mut self, action: ActionType, policy: RateLimitPolicy) -> Self {
        self.policies.insert(action, policy);
        self
    }

    /// Load from the process environment (and `.env`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Load from an arbitrary lookup; unset variables keep their defaults
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for (action, _, _) in Self::presets() {
            let current = config.policy_for(&ActionType::new(action));
            let policy = read_policy(&lookup, &action.to_ascii_uppercase(), current)?;
            config.policies.insert(ActionType::new(action), policy);
        }
        config.fallback_policy = read_policy(&lookup, "FALLBACK", config.fallback_policy)?;

        let min_length_key = format!("{ENV_PREFIX}_PASSWORD_MIN_LENGTH");
        let min_length = parse_or(&lookup, &min_length_key, MIN_PASSWORD_LENGTH)?;
        if min_length == 0 {
            return Err(ConfigError::Invalid {
                key: min_length_key,
                reason: "must be at least 1".to_string(),
            });
        }
        config.password = PasswordPolicy {
            min_length,
            require_strong: flag_or(
                &lookup,
                &format!("{ENV_PREFIX}_REQUIRE_STRONG_PASSWORDS"),
                config.password.require_strong,
            )?,
        };
        config.exempt_loopback = flag_or(
            &lookup,
            &format!("{ENV_PREFIX}_EXEMPT_LOOPBACK"),
            config.exempt_loopback,
        )?;

        tracing::debug!(
            actions = config.policies.len(),
            password_min_length = config.password.min_length,
            require_strong = config.password.require_strong,
            exempt_loopback = config.exempt_loopback,
            "Loaded access config"
        );
        Ok(config)
    }
}

/// `ACCESS_<NAME>_MAX_ATTEMPTS` / `ACCESS_<NAME>_WINDOW_SECS`
fn read_policy<L>(
    lookup: &L,
    name: &str,
    default: RateLimitPolicy,
) -> Result<RateLimitPolicy, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    let max_key = format!("{ENV_PREFIX}_{name}_MAX_ATTEMPTS");
    let window_key = format!("{ENV_PREFIX}_{name}_WINDOW_SECS");

    let max_attempts: u32 = parse_or(lookup, &max_key, default.max_attempts)?;
    if max_attempts == 0 {
        return Err(ConfigError::Invalid {
            key: max_key,
            reason: "must be at least 1".to_string(),
        });
    }

    // Range-check before building the Duration
    let window_secs: i64 = parse_or(lookup, &window_key, default.window.num_seconds())?;
    if !(1..=MAX_WINDOW_SECS).contains(&window_secs) {
        return Err(ConfigError::Invalid {
            key: window_key,
            reason: format!("must be between 1 and {MAX_WINDOW_SECS}"),
        });
    }

    Ok(RateLimitPolicy::from_secs(max_attempts, window_secs))
}
