//! Error types for iris

use axum::http::StatusCode;
use thiserror::Error;

/// Main error type for iris operations
#[derive(Debug, Error)]
pub enum IrisError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Scan orchestration failed: {0}")]
    OrchestrationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Analysis error: {0}")]
    AnalysisError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),
}

impl IrisError {
    /// HTTP status a transport layer should answer with for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            IrisError::NotFound(_) => StatusCode::NOT_FOUND,
            IrisError::Conflict(_) => StatusCode::CONFLICT,
            IrisError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            IrisError::ValidationError(_) | IrisError::UrlError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for iris operations
pub type Result<T> = std::result::Result<T, IrisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            IrisError::NotFound("Scan not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            IrisError::Conflict("Scan is already running".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            IrisError::PreconditionFailed("x".into()).status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            IrisError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IrisError::StoreError("disk full".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_is_bare_message_for_api_errors() {
        let err = IrisError::Conflict("Scan is already completed".into());
        assert_eq!(err.to_string(), "Scan is already completed");
    }
}
