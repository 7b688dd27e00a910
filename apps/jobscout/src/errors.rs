use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
///
/// Which variants abort a run is decided by the pipeline: feed, scoring and
/// authentication failures are fatal, generation failures are scoped to the
/// posting that caused them. Configuration errors never get this far; they
/// surface as `anyhow` errors in `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Feed error: {0}")]
    Feed(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// True when the model backend rejected our credentials. Every later call
    /// would fail the same way, so callers treat this as fatal.
    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::Auth { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_are_flagged() {
        let err = AppError::from(LlmError::Auth {
            status: Some(401),
            details: "invalid_api_key".to_string(),
        });
        assert!(err.is_auth());
    }

    #[test]
    fn test_other_llm_errors_are_not_auth() {
        let err = AppError::from(LlmError::Api {
            status: 500,
            message: "boom".to_string(),
        });
        assert!(!err.is_auth());
        assert!(!AppError::Generation("empty".to_string()).is_auth());
    }
}
