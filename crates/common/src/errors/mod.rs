//! Error types for Quotebook services
//!
//! Provides:
//! - Distinct error kinds for business-rule, lookup and infrastructure failures
//! - Reason keys that clients translate into localized messages
//! - Field-level details for validation failures
//! - HTTP status code mapping and structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Reason keys shared by every content kind.
///
/// Kind-specific keys (`error.quote.not_found`, ...) are built by
/// [`crate::content::ContentKind::reason`].
pub mod reason {
    pub const REQUEST_FORMAT: &str = "error.common.request_format";
    pub const INVALID_URL: &str = "error.common.invalid_url";
    pub const REASON_NOT_FOUND: &str = "error.reason.not_found";
    pub const RECOMMEND_TAG_ENTER: &str = "error.tag.recommend_tag_enter";
    pub const TAG_NOT_FOUND: &str = "error.tag.not_found";
    pub const USER_NOT_FOUND: &str = "error.user.not_found";
    pub const OBJECT_NOT_FOUND: &str = "error.object.not_found";
    pub const UNKNOWN_STATUS: &str = "error.common.unknown_status";
    pub const UNAUTHORIZED: &str = "error.auth.unauthorized";
    pub const FORBIDDEN: &str = "error.auth.forbidden";
    pub const DATABASE: &str = "error.database";
    pub const UNKNOWN: &str = "error.unknown";
}

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request errors (1xxx)
    ValidationError,
    BadRequest,

    // Authentication errors (2xxx)
    Unauthorized,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    UpstreamError,
    QueueError,
    CacheError,
    SearchError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::BadRequest => 1002,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::ExpiredToken => 2002,

            ErrorCode::Forbidden => 3001,

            ErrorCode::NotFound => 4001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::QueueError => 8002,
            ErrorCode::CacheError => 8003,
            ErrorCode::SearchError => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Business-rule violation carrying a translatable reason key
    #[error("Bad request: {reason}{}", message_suffix(.message))]
    BadRequest {
        reason: String,
        message: Option<String>,
        fields: Vec<FieldError>,
    },

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Queue error: {message}")]
    QueueError { message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("Search index error: {message}")]
    SearchError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

fn message_suffix(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(" ({m})"),
        _ => String::new(),
    }
}

impl AppError {
    /// Business-rule violation identified by a reason key
    pub fn bad_request(reason: impl Into<String>) -> Self {
        AppError::BadRequest {
            reason: reason.into(),
            message: None,
            fields: Vec::new(),
        }
    }

    /// Business-rule violation with a human readable message
    pub fn bad_request_msg(reason: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::BadRequest {
            reason: reason.into(),
            message: Some(message.into()),
            fields: Vec::new(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        AppError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }

    /// Attach a field-level detail to a BadRequest error. Other kinds are returned as-is.
    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        if let AppError::BadRequest { fields, .. } = &mut self {
            fields.push(FieldError::new(field, message));
        }
        self
    }

    /// Translatable reason key for this error
    pub fn reason(&self) -> String {
        match self {
            AppError::BadRequest { reason, .. } => reason.clone(),
            AppError::Validation { .. } => reason::REQUEST_FORMAT.to_string(),
            AppError::NotFound { resource_type, .. } => format!("error.{resource_type}.not_found"),
            AppError::Unauthorized { .. } | AppError::ExpiredToken => reason::UNAUTHORIZED.to_string(),
            AppError::Forbidden { .. } => reason::FORBIDDEN.to_string(),
            AppError::Database(_) | AppError::DatabaseConnection { .. } => reason::DATABASE.to_string(),
            _ => reason::UNKNOWN.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::BadRequest { .. } => ErrorCode::BadRequest,
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::QueueError { .. } => ErrorCode::QueueError,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::SearchError { .. } => ErrorCode::SearchError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::BadRequest { .. } | AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::HttpClient(_) | AppError::SearchError { .. } => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::QueueError { .. } | AppError::CacheError { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// True for the NotFound kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let reason = self.reason();

        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %self,
                code = ?code,
                reason = %reason,
                status = status.as_u16(),
                "Client error"
            );
        }

        // Server errors never leak driver messages to clients
        let (message, details) = match &self {
            AppError::BadRequest { message, fields, .. } => (
                message.clone().unwrap_or_else(|| reason.clone()),
                (!fields.is_empty()).then(|| serde_json::json!({ "fields": fields })),
            ),
            AppError::Validation { message, field } => (
                message.clone(),
                field.as_ref().map(|f| serde_json::json!({ "field": f })),
            ),
            _ if self.is_server_error() => ("internal server error".to_string(), None),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                reason,
                message,
                details,
                request_id: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err.field_errors().keys().next().map(|f| f.to_string());
        AppError::Validation {
            message: err.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        let err = AppError::not_found("quote", "10010000000000001");
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.reason(), "error.quote.not_found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_bad_request_with_field() {
        let err = AppError::bad_request(reason::RECOMMEND_TAG_ENTER).with_field("tags", reason::TAG_NOT_FOUND);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
        match err {
            AppError::BadRequest { reason, fields, .. } => {
                assert_eq!(reason, "error.tag.recommend_tag_enter");
                assert_eq!(fields, vec![FieldError::new("tags", "error.tag.not_found")]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_with_field_ignores_other_kinds() {
        let err = AppError::internal("boom").with_field("tags", "x");
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[test]
    fn test_database_error_is_internal_server() {
        let err: AppError = sea_orm::DbErr::Custom("connection reset".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
        assert_eq!(err.reason(), reason::DATABASE);
    }

    #[test]
    fn test_bad_request_display() {
        let err = AppError::bad_request_msg(reason::RECOMMEND_TAG_ENTER, "\"x\" can only be used by moderators.");
        assert_eq!(
            err.to_string(),
            "Bad request: error.tag.recommend_tag_enter (\"x\" can only be used by moderators.)"
        );
    }
}
