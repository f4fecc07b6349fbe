// =============================================================================
// ERROR MODULE
// =============================================================================
// This module defines the error taxonomy of the service and its HTTP responses.
//
// NOTES:
// - Every failure carries a machine-checkable kind (ErrorKind) plus a
//   human-readable message
// - The entity layer never logs or formats errors for users; it returns them
//   to the caller (handler), which decides how to present them
// - Nothing in the core retries automatically
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::metrics;
use crate::models::ErrorResponse;
use crate::permission::{Operation, Resource};

// =============================================================================
// ERROR KIND
// =============================================================================
/// Machine-checkable category of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Validation,
    PermissionDenied,
    NotEmpty,
    InvalidArgument,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::NotEmpty => "NOT_EMPTY",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

// =============================================================================
// VALIDATION ERRORS
// =============================================================================
// Rejected attribute values. A validation failure always means that nothing
// was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The new parent is the element itself or one of its descendants
    #[error("{entity} {id} cannot be moved below {new_parent_id}: it is the element itself or one of its descendants")]
    Cycle {
        entity: &'static str,
        id: i64,
        new_parent_id: i64,
    },

    /// A sibling with the same name (case-insensitive) already exists
    #[error("an element named \"{name}\" already exists below parent {parent_id}")]
    DuplicateName { name: String, parent_id: i64 },

    /// Stock would drop below zero
    #[error("stock of part {part_id} would become negative: {current} in stock, delta {delta}")]
    NegativeStock { part_id: i64, current: u32, delta: i64 },

    /// Relative stock changes need a known stock level
    #[error("stock of part {part_id} is unknown and cannot be adjusted by a delta")]
    UnknownStock { part_id: i64 },

    /// Stored parent pointers form a cycle or exceed the depth guard
    #[error("tree of {entity} {id} is corrupted (cycle or deeper than {max_depth} levels)")]
    CorruptTree {
        entity: &'static str,
        id: i64,
        max_depth: usize,
    },

    /// Any other rejected attribute value
    #[error("invalid value for {field}: {reason}")]
    Attribute { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn attribute(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Attribute {
            field,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// APPLICATION ERROR
// =============================================================================
#[derive(Debug, Error)]
pub enum AppError {
    // -------------------------------------------------------------------------
    // STORAGE ERRORS
    // -------------------------------------------------------------------------
    /// Database query failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // -------------------------------------------------------------------------
    // DOMAIN ERRORS
    // -------------------------------------------------------------------------
    /// No row matches the requested id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Bad attribute value (negative stock, duplicate sibling name, cycle, ...)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The acting principal lacks the right
    #[error("Permission denied: {operation} on {resource}")]
    PermissionDenied {
        resource: Resource,
        operation: Operation,
    },

    /// Delete blocked by children or dependent records
    #[error("Cannot delete {entity} {id}: {reason}")]
    NotEmpty {
        entity: &'static str,
        id: i64,
        reason: String,
    },

    /// Malformed caller input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // INTERNAL ERRORS
    // -------------------------------------------------------------------------
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        AppError::NotFound { entity, id }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidArgument(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AppError::NotEmpty { .. } => ErrorKind::NotEmpty,
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the wrapped validation error, if any.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            AppError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

// =============================================================================
// HTTP RESPONSE CONVERSION
// =============================================================================
// Handlers return AppResult<T>; axum turns the error into a JSON body with a
// fitting status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        let (status, message) = match &self {
            // 404 Not Found: Row doesn't exist
            AppError::NotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),

            // 422: Rejected attribute values
            AppError::Validation(err) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),

            // 403: The principal's group does not allow the operation
            AppError::PermissionDenied {
                resource,
                operation,
            } => {
                metrics::record_permission_denied(*resource, *operation);
                (StatusCode::FORBIDDEN, self.to_string())
            }

            // 409: Delete blocked by dependents
            AppError::NotEmpty { .. } => (StatusCode::CONFLICT, self.to_string()),

            // 400: Malformed input
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            // 500: Don't expose internal details
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A database error occurred".to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error_code = kind.as_str(), error = %self, "Request failed");
        } else {
            tracing::warn!(error_code = kind.as_str(), message = %message, "Request rejected");
        }
        metrics::record_error(kind);

        let body = ErrorResponse::new(kind.as_str(), message);

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// RESULT TYPE ALIAS
// =============================================================================
pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_machine_checkable() {
        assert_eq!(AppError::not_found("Part", 3).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::from(ValidationError::UnknownStock { part_id: 1 }).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::PermissionDenied {
                resource: Resource::Parts,
                operation: Operation::Delete,
            }
            .kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(AppError::invalid("x").kind(), ErrorKind::InvalidArgument);
        assert_eq!(AppError::Internal("boom".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::not_found("Part", 1), StatusCode::NOT_FOUND),
            (
                AppError::from(ValidationError::attribute("name", "empty")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::PermissionDenied {
                    resource: Resource::Parts,
                    operation: Operation::Read,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::NotEmpty {
                    entity: "Category",
                    id: 2,
                    reason: "has children".into(),
                },
                StatusCode::CONFLICT,
            ),
            (AppError::invalid("bad"), StatusCode::BAD_REQUEST),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_message_names_entity_and_id() {
        let err = AppError::not_found("Category", 42);
        assert_eq!(err.to_string(), "Category not found: 42");
    }
}
