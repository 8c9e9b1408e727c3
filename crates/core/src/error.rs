//! Error types for the taskforge domain.
//!
//! Backend failures get their own `GenerationError` so callers can react
//! to rate limits or auth problems specifically; everything else surfaces
//! through the top-level `Error`.

use thiserror::Error;

/// The top-level error type for all taskforge operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// The selected backend has no usable model (missing key, not loaded).
    #[error("No model loaded")]
    NoModelLoaded,

    /// The pipeline rejects re-entrant runs.
    #[error("A run is already in progress")]
    RunInProgress,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while talking to a generation backend.
///
/// Clone because a failed task records the error in the run log while the
/// pipeline also reports it upward.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Backend returned {status_code}: {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_mentions_status_and_body() {
        let err = Error::Generation(GenerationError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn no_model_loaded_message() {
        let err = Error::NoModelLoaded;
        assert_eq!(err.to_string(), "No model loaded");
    }

    #[test]
    fn generation_error_converts_to_top_level() {
        let err: Error = GenerationError::Timeout("120s elapsed".into()).into();
        assert!(matches!(err, Error::Generation(GenerationError::Timeout(_))));
    }
}
