//! Error types for LLM and lookup collaborators.

use std::time::Duration;

use thiserror::Error;

/// Why parsing a model reply failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorReason {
    /// No JSON could be located in the raw output
    MarkdownExtractionFailed,
    /// The located text is not valid JSON
    InvalidJson,
    /// Valid JSON, wrong shape
    SchemaMismatch,
    /// Truncated output
    UnexpectedEof,
}

/// Errors surfaced by the collaborators the assistant depends on.
#[derive(Error, Debug)]
pub enum AgentError {
    /// The collaborator could not run at all
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// An upstream HTTP call returned a failure
    #[error("process error (status: {status_code:?}): {message}")]
    ProcessError {
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// Model output could not be parsed into the expected shape
    #[error("parse error: {message}")]
    ParseError {
        message: String,
        reason: ParseErrorReason,
    },

    /// The model requested a tool that is not registered
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for unexpected failures
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Creates a process error carrying an upstream `Retry-After` hint.
    pub fn process_error_with_retry_after(
        status_code: u16,
        message: impl Into<String>,
        is_retryable: bool,
        retry_after: Duration,
    ) -> Self {
        Self::ProcessError {
            status_code: Some(status_code),
            message: message.into(),
            is_retryable,
            retry_after: Some(retry_after),
        }
    }

    /// Check if the failure is worth retrying upstream
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProcessError { is_retryable: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_constructor() {
        let err = AgentError::process_error_with_retry_after(
            429,
            "rate limited",
            true,
            Duration::from_secs(30),
        );
        assert!(err.is_retryable());
        match err {
            AgentError::ProcessError {
                status_code,
                retry_after,
                ..
            } => {
                assert_eq!(status_code, Some(429));
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_process_errors_are_not_retryable() {
        assert!(!AgentError::ExecutionFailed("boom".into()).is_retryable());
        assert!(!AgentError::UnknownTool("nope".into()).is_retryable());
    }
}
