//! # Error Handling
//!
//! Three layers of errors:
//! - [`QueryError`] for malformed query strings and operands (always a client error)
//! - [`ProviderError`] for data-access failures and capability vetoes
//! - [`ApiError`] for HTTP responses, with sanitized messages and server-side logging
//!
//! Database details are logged through `tracing` and never sent to clients.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// A query string or operand that could not be turned into conditions.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid JSON in `{param}`: {source}")]
    InvalidJson {
        param: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("sort must be pairs")]
    SortPairs,

    #[error("got {orders} order values but {descs} desc values")]
    OrderDescMismatch { orders: usize, descs: usize },

    #[error("`{param}` must be an integer, got `{value}`")]
    InvalidNumber { param: String, value: String },

    #[error("`{param}` must be a boolean, got `{value}`")]
    InvalidBool { param: String, value: String },

    #[error("`{value}` is not a valid {expected} for `{field}`")]
    InvalidOperand {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("unknown field `{0}`")]
    InvalidField(String),
}

/// Failure of a resource provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: i64 },

    #[error("{resource} {id} cannot be deleted")]
    NotDeletable { resource: &'static str, id: i64 },

    #[error("{resource} has no relation `{relation}`")]
    UnknownRelation {
        resource: &'static str,
        relation: String,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] DbErr),
}

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// 400 Bad Request - invalid input from the client
    BadRequest { message: String },

    /// 409 Conflict - the resource refuses the operation
    Conflict { message: String },

    /// 500 Internal Server Error - database error (details logged, not exposed)
    Database { message: String, internal: DbErr },

    /// 500 Internal Server Error - generic internal error
    Internal {
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    // ============================================================================
    // Constructors
    // ============================================================================

    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// The database error is logged, the client sees a generic message.
    #[must_use]
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    // ============================================================================
    // Internal methods
    // ============================================================================

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The sanitized message sent to clients.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::BadRequest { message }
            | Self::Conflict { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();
        let status = self.status_code();
        let response = ErrorResponse {
            error: self.user_message(),
        };
        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// Conversions
// ============================================================================

/// - `DbErr::RecordNotFound` → 404
/// - all other `DbErr` variants → 500, logged internally
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Resource");
                Self::not_found(resource, None)
            }
            _ => Self::database(err),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { resource, id } => {
                Self::not_found(resource, Some(id.to_string()))
            }
            ProviderError::NotDeletable { .. } => Self::conflict(err.to_string()),
            ProviderError::UnknownRelation { .. } => Self::bad_request(err.to_string()),
            ProviderError::Query(err) => err.into(),
            ProviderError::Store(err) => err.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
