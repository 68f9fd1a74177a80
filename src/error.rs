//! Error types for the SharePoint MCP server

use thiserror::Error;

/// Result type alias for SharePoint operations
pub type Result<T> = std::result::Result<T, SharePointError>;

/// Main error type for the SharePoint MCP server
#[derive(Error, Debug)]
pub enum SharePointError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Rejected by remote: {0}")]
    BadRequest(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("No such resource: {0}")]
    NoSuchResource(String),

    #[error("No such tool: {0}")]
    NoSuchTool(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SharePointError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, SharePointError::Unavailable(_))
    }

    /// Get error code for MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            SharePointError::InvalidArguments(_)
            | SharePointError::InvalidIdentifier(_)
            | SharePointError::NoSuchTool(_) => -32602,
            SharePointError::NoSuchResource(_) => -32002,
            SharePointError::NotFound(_) => -32001,
            SharePointError::Unauthorized(_) => -32003,
            SharePointError::Unavailable(_) => -32004,
            SharePointError::AlreadyExists(_) => -32005,
            SharePointError::InvalidName(_) => -32006,
            SharePointError::BadRequest(_) => -32007,
            _ => -32000,
        }
    }

    /// Stable kind name, attached to protocol errors as structured metadata
    pub fn kind(&self) -> &'static str {
        match self {
            SharePointError::InvalidIdentifier(_) => "InvalidIdentifier",
            SharePointError::NotFound(_) => "NotFound",
            SharePointError::Unauthorized(_) => "Unauthorized",
            SharePointError::Unavailable(_) => "Unavailable",
            SharePointError::AlreadyExists(_) => "AlreadyExists",
            SharePointError::InvalidName(_) => "InvalidName",
            SharePointError::BadRequest(_) => "BadRequest",
            SharePointError::InvalidArguments(_) => "InvalidArguments",
            SharePointError::NoSuchResource(_) => "NoSuchResource",
            SharePointError::NoSuchTool(_) => "NoSuchTool",
            SharePointError::Config(_) => "Config",
            SharePointError::Serialization(_) => "Serialization",
            SharePointError::Io(_) => "Io",
            SharePointError::Internal(_) => "Internal",
        }
    }

    /// Errors raised before any remote call is attempted
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            SharePointError::InvalidArguments(_)
                | SharePointError::InvalidIdentifier(_)
                | SharePointError::NoSuchResource(_)
                | SharePointError::NoSuchTool(_)
        )
    }
}

#[cfg(feature = "graph")]
impl From<reqwest::Error> for SharePointError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            SharePointError::Unavailable(err.to_string())
        } else if err.is_decode() {
            SharePointError::Internal(format!("Failed to decode response: {}", err))
        } else {
            SharePointError::Unavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(SharePointError::Unavailable("timeout".into()).is_retryable());
        assert!(!SharePointError::Unauthorized("expired".into()).is_retryable());
        assert!(!SharePointError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn test_request_errors_use_invalid_params_code() {
        assert_eq!(SharePointError::InvalidArguments("x".into()).code(), -32602);
        assert_eq!(SharePointError::NoSuchTool("x".into()).code(), -32602);
        assert_eq!(SharePointError::Internal("x".into()).code(), -32000);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(SharePointError::AlreadyExists("Reports".into()).kind(), "AlreadyExists");
        assert_eq!(SharePointError::NoSuchResource("x".into()).kind(), "NoSuchResource");
    }

    #[test]
    fn test_remote_rejection_is_not_a_request_error() {
        let err = SharePointError::BadRequest("invalidRequest".into());
        assert!(!err.is_request_error());
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "BadRequest");
        assert_ne!(err.code(), -32602);
    }
}
