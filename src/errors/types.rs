//! Error type definitions for the aggregator
//!
//! A hierarchical error system: [`AppError`] is the top-level type, with
//! [`SourceError`] covering the outbound collaborators.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Source handling errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Persisted JSON could not be parsed; callers replace it with a default
    #[error("Corrupt document {path}: {message}")]
    ConfigCorrupt { path: String, message: String },

    /// A source was addressed by an out-of-range position
    #[error("Invalid index {index} (have {len} sources)")]
    InvalidIndex { index: i64, len: usize },

    /// The extractor produced no candidate stream URL
    #[error("No stream URL could be extracted from {web_url}")]
    ExtractionEmpty { web_url: String },

    /// Every candidate failed validation
    #[error("All {candidates} candidate URLs failed validation")]
    ValidationFailed { candidates: usize },

    /// The primary platform failed or timed out
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    /// Path password did not match; the message is the response body
    #[error("身份认证失败")]
    AuthFailure,

    /// Request method outside GET/POST/HEAD/OPTIONS; the message is the response body
    #[error("请使用GET或POST请求")]
    UnsupportedMethod { method: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors raised at the outbound collaborator boundary
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Parsing errors for upstream payloads
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },

    /// HTTP errors from upstream
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an upstream-unavailable error
    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }
}

impl SourceError {
    /// Create a parse error for an upstream payload
    pub fn parse<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_index_message() {
        let err = AppError::InvalidIndex { index: 7, len: 2 };
        assert_eq!(err.to_string(), "Invalid index 7 (have 2 sources)");
    }

    #[test]
    fn test_request_errors_carry_response_bodies() {
        assert_eq!(AppError::AuthFailure.to_string(), "身份认证失败");
        let err = AppError::UnsupportedMethod {
            method: "DELETE".to_string(),
        };
        assert_eq!(err.to_string(), "请使用GET或POST请求");
    }
}
