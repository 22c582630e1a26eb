//! Password Strength Evaluation
//!
//! Additive scoring of a candidate secret with user-facing feedback.
//!
//! | Check                         | Points |
//! |-------------------------------|--------|
//! | length >= `min_length`        | +2     |
//! | uppercase letter              | +1     |
//! | lowercase letter              | +1     |
//! | digit                         | +1     |
//! | special character             | +2     |
//!
//! A candidate that matches the common-password blacklist scores 0
//! regardless of its character classes.
//!
//! Evaluation is pure: the same input always yields the same report.

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// Constants
// ============================================================================

/// Default minimum length, counted in Unicode scalar values
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Highest possible score
pub const MAX_SCORE: u8 = 7;

/// Score required when strong passwords are enforced
pub const STRONG_SCORE_THRESHOLD: u8 = 5;

/// Score required when strong passwords are not enforced
pub const RELAXED_SCORE_THRESHOLD: u8 = 2;

/// Characters counted as "special"
pub const SPECIAL_CHARACTERS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>?"#;

/// Passwords rejected outright (compared after NFKC + lowercase)
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "password123",
    "admin",
    "letmein",
    "welcome",
    "monkey",
    "1234567890",
    "qwerty",
    "dragon",
    "master",
    "user",
];

const TOO_COMMON_FEEDBACK: &str = "Password is too common and easily guessed";

// ============================================================================
// Report
// ============================================================================

/// Result of evaluating one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrengthReport {
    /// 0..=7
    pub score: u8,
    pub valid: bool,
    /// Ordered, user-facing hints for the checks that failed
    pub feedback: Vec<String>,
}

// ============================================================================
// Policy / Evaluator
// ============================================================================

/// Password policy loaded once at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    /// Require score >= 5 (otherwise >= 2)
    pub require_strong: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            require_strong: true,
        }
    }
}

impl PasswordPolicy {
    pub fn valid_threshold(&self) -> u8 {
        if self.require_strong {
            STRONG_SCORE_THRESHOLD
        } else {
            RELAXED_SCORE_THRESHOLD
        }
    }
}

/// Scores candidate passwords against a [`PasswordPolicy`]
#[derive(Debug, Clone, Default)]
pub struct PasswordStrengthEvaluator {
    policy: PasswordPolicy,
}

impl PasswordStrengthEvaluator {
    pub fn new(policy: PasswordPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }

    /// Evaluate a candidate. Never fails; an empty string scores 0.
    pub fn evaluate(&self, candidate: &str) -> PasswordStrengthReport {
        let mut score = 0u8;
        let mut feedback = Vec::new();

        if candidate.chars().count() >= self.policy.min_length {
            score += 2;
        } else {
            feedback.push(format!(
                "Password must be at least {} characters long",
                self.policy.min_length
            ));
        }

        if candidate.chars().any(|c| c.is_ascii_uppercase()) {
            score += 1;
        } else {
            feedback.push("Password must contain at least one uppercase letter".to_string());
        }

        if candidate.chars().any(|c| c.is_ascii_lowercase()) {
            score += 1;
        } else {
            feedback.push("Password must contain at least one lowercase letter".to_string());
        }

        if candidate.chars().any(|c| c.is_ascii_digit()) {
            score += 1;
        } else {
            feedback.push("Password must contain at least one number".to_string());
        }

        if candidate.chars().any(is_special) {
            score += 2;
        } else {
            feedback.push("Password must contain at least one special character".to_string());
        }

        // Overrides every positive contribution
        if is_common_password(candidate) {
            score = 0;
            feedback.push(TOO_COMMON_FEEDBACK.to_string());
        }

        PasswordStrengthReport {
            score,
            valid: score >= self.policy.valid_threshold(),
            feedback,
        }
    }
}

/// Evaluate with the default policy
pub fn evaluate(candidate: &str) -> PasswordStrengthReport {
    PasswordStrengthEvaluator::default().evaluate(candidate)
}

// ============================================================================
// Helper Functions
// ============================================================================

fn is_special(c: char) -> bool {
    SPECIAL_CHARACTERS.contains(c)
}

/// Blacklist lookup on the NFKC-normalized, lower-cased candidate
fn is_common_password(candidate: &str) -> bool {
    let canonical: String = candidate.nfkc().collect::<String>().to_lowercase();
    COMMON_PASSWORDS.contains(&canonical.as_str())
}

// ============================================================================
// Tests
// ============================================================================
