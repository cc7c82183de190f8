//! # Error Types
//!
//! Failures that can reach a caller of the resource manager.
//!
//! Resource exhaustion (full pool, cache over budget) is deliberately absent:
//! it degrades instead of failing.

use thiserror::Error;

/// Errors raised while applying configuration or persisting state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DuatError {
    /// A configuration value was rejected.
    #[error("invalid configuration: {field}: {reason}")]
    InvalidConfig {
        /// The offending option.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(String),

    /// A TOML document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A value could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(String),
}

impl DuatError {
    /// Shorthand for [`DuatError::InvalidConfig`].
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for DuatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DuatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for DuatError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// Result type for configuration and persistence operations.
pub type DuatResult<T> = Result<T, DuatError>;
