//! Error Types for the Stockyard API
//!
//! This module defines error handling for the HTTP/WebSocket layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes and
//! a timestamp.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use stockyard_core::FleetError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each code maps to a specific HTTP status and is the stable wire-level
/// category; messages are free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed names, SKUs, or payloads.
    ValidationError,

    /// Create-child collision.
    AgentExists,

    /// Child, SKU, or resource missing.
    NotFound,

    /// Wrong verb for an endpoint.
    MethodNotAllowed,

    /// Unexpected condition.
    InternalError,

    /// Storage failure.
    StoreError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::AgentExists => StatusCode::CONFLICT,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::InternalError | ErrorCode::StoreError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
///
/// The same shape is echoed on subscription channels as
/// `{type: "error", message}` frames; HTTP callers additionally see the
/// code, optional details, and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (store failure reasons, field errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// When the error was produced
    pub timestamp: DateTime<Utc>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Create a ValidationError.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Create a NotFound error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create an AgentExists conflict.
    pub fn agent_exists(name: &str) -> Self {
        Self::new(ErrorCode::AgentExists, format!("Agent {name:?} already exists"))
    }

    /// Create a MethodNotAllowed error.
    pub fn method_not_allowed(method: &axum::http::Method) -> Self {
        Self::new(
            ErrorCode::MethodNotAllowed,
            format!("Method {method} not allowed for this endpoint"),
        )
    }

    /// Create an InternalError.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create a StoreError with the failure reason in `details`.
    pub fn store(message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::StoreError, message)
            .with_details(serde_json::json!({ "reason": reason.into() }))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Implement IntoResponse for ApiError to enable automatic error handling
/// in Axum handlers.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Map domain errors onto wire-level codes.
impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::Validation(e) => ApiError::validation(e.to_string()),
            FleetError::AgentExists { name } => ApiError::agent_exists(&name),
            FleetError::NotFound { what, name } => {
                ApiError::not_found(format!("{what} not found: {name:?}"))
            }
            FleetError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                ApiError::store("Store operation failed", e.to_string())
            }
            FleetError::Fabric(e) => {
                tracing::error!(error = %e, "fabric failure");
                ApiError::internal(e.to_string())
            }
            FleetError::Model(e) => {
                tracing::error!(error = %e, "model failure");
                ApiError::internal(e.to_string())
            }
            FleetError::Config(e) => ApiError::internal(e.to_string()),
            FleetError::Internal(message) => ApiError::internal(message),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid JSON: {err}"))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::AgentExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ErrorCode::StoreError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_wire_form_is_screaming_snake_case() {
        let err = ApiError::validation("bad segment");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert!(json.get("timestamp").is_some());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_store_error_carries_details() {
        let err = ApiError::store("Store operation failed", "disk full");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "STORE_ERROR");
        assert_eq!(json["details"]["reason"], "disk full");
    }

    #[test]
    fn test_fleet_error_mapping() {
        let err: ApiError = stockyard_core::FleetError::AgentExists {
            name: "wh".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::AgentExists);

        let err: ApiError = stockyard_core::FleetError::NotFound {
            what: "SKU".to_string(),
            name: "SKU-9".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}
