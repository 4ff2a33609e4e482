//! Error types for the jieri domain layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the jieri domain layer.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreError {
    /// No year/month reference could be recovered from the question.
    ///
    /// Recoverable: callers map this to a structured error payload
    /// instead of propagating it to the end user.
    #[error("no year/month reference found in question")]
    DateNotFound,

    /// A matched segment did not name a valid calendar date
    #[error("invalid calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    /// A holiday name was empty after trimming markup
    #[error("holiday name is empty")]
    EmptyName,

    /// Serialization/deserialization error
    #[error("serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a DateNotFound error
    pub fn is_date_not_found(&self) -> bool {
        matches!(self, Self::DateNotFound)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, CoreError>`.
pub type Result<T> = std::result::Result<T, CoreError>;
