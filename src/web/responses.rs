//! HTTP response types and utilities
//!
//! Every JSON response carries a `success` flag and, on failure, a
//! `message` string.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::{AppError, SourceError};
use crate::models::OperationResult;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for OperationResult {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(self)).into_response()
    }
}

/// HTTP status for an error surfaced to a client
pub fn status_for(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation { .. } | AppError::InvalidIndex { .. } | AppError::Json(_) => {
            StatusCode::BAD_REQUEST
        }
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Source(SourceError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        AppError::UpstreamUnavailable { .. }
        | AppError::Source(_)
        | AppError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an AppError into a JSON failure response
pub fn handle_error(error: AppError) -> Response {
    (status_for(&error), Json(ApiResponse::error(error.to_string()))).into_response()
}
