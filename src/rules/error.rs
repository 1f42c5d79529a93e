//! Error types for rule validation.

use thiserror::Error;

/// Errors raised while validating a configured rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A day-of-week token isn't one of `mon`..`sun`.
    #[error("rule '{rule}': unknown day '{token}' (expected mon, tue, wed, thu, fri, sat or sun)")]
    UnknownDay {
        /// Rule name.
        rule: String,
        /// Offending token.
        token: String,
    },
}

impl RuleError {
    /// Creates an unknown day error.
    pub fn unknown_day(rule: impl Into<String>, token: impl Into<String>) -> Self {
        Self::UnknownDay {
            rule: rule.into(),
            token: token.into(),
        }
    }
}
