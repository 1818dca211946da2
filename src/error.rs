//! Service error types with HTTP status code mapping.
//!
//! [`ShiftFlexError`] is the central error type. Each variant maps to a
//! numeric error code, an HTTP status and a structured JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "match 5b0c... is pending",
///     "details": "pending",
///     "retryable": false
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details (the current status for state errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Whether repeating the call may succeed.
    pub retryable: bool,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                  |
/// |-----------|-----------------------|------------------------------|
/// | 1000–1999 | Validation / access   | 400 Bad Request / 403        |
/// | 2000–2999 | Not found / state     | 404 / 409 Conflict           |
/// | 3000–3999 | Dependencies          | 500 / 502 / 503              |
#[derive(Debug, thiserror::Error)]
pub enum ShiftFlexError {
    /// Referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Record kind (`"shift"`, `"swap request"`, `"match"`, ...).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// The record is in a status that does not allow the operation.
    #[error("{entity} {id} is {status}")]
    InvalidState {
        /// Record kind.
        entity: &'static str,
        /// Record identifier.
        id: String,
        /// Current status, surfaced so callers can explain the refusal.
        status: String,
    },

    /// The operation collides with an existing active record.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting user may not touch this record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Datastore or other collaborator failure.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// A collaborator call did not finish in time.
    #[error("timed out during {0}")]
    Timeout(&'static str),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ShiftFlexError {
    /// Builds a [`ShiftFlexError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Builds a [`ShiftFlexError::InvalidState`].
    pub fn invalid_state(entity: &'static str, id: impl ToString, status: impl ToString) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            status: status.to_string(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Forbidden(_) => 1003,
            Self::NotFound { .. } => 2001,
            Self::InvalidState { .. } => 2101,
            Self::Conflict(_) => 2201,
            Self::Internal(_) => 3000,
            Self::Dependency(_) => 3001,
            Self::Timeout(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidState { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Dependency(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` when retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Dependency(_))
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::InvalidState { status, .. } => Some(status.clone()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for ShiftFlexError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::Dependency("row vanished during update".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Dependency(err.to_string()),
        }
    }
}

impl IntoResponse for ShiftFlexError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
                retryable: self.is_retryable(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
