//! Configuration errors.

use thiserror::Error;

/// Errors raised while parsing or validating configuration.
///
/// This is the only fatal error class in the system: everything else is
/// logged and survived at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("renewal.percentage must be between 0 and 100 (inclusive), got {0}")]
    RenewalPercentage(u32),

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("invalid time of day {0:?}, expected HH:MM:SS")]
    InvalidTimeOfDay(String),

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
}
