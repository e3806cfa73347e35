//! Error handling for the key pool.
//!
//! Every fallible operation returns [`Result`]. Only [`AppError::Unavailable`]
//! is meant to reach product endpoints; the rest are operational failures
//! (configuration, storage, transport) that surface through logs and the
//! admin routes.

pub mod types;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Error response body following RFC 7807 Problem Details
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    pub request_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum AppError {
    // Configuration errors
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String, line: Option<usize> },

    // Storage errors
    #[error("Redis connection failed: {message}")]
    RedisConnection { message: String },

    #[error("Redis operation failed: {operation} - {message}")]
    RedisOperation { operation: String, message: String },

    #[error("Credential not found: {id}")]
    CredentialNotFound { id: String },

    // Key pool
    #[error("No credential is currently available")]
    Unavailable,

    // HTTP and network errors
    #[error("HTTP client error: {message}")]
    HttpClient { message: String, status_code: Option<u16> },

    #[error("Authentication required")]
    Unauthorized,

    // System errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("IO operation failed: {operation} - {message}")]
    Io { operation: String, message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn config_validation(message: impl Into<String>, field: Option<impl Into<String>>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            field: field.map(Into::into),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::CredentialNotFound { id: id.into() }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ConfigParse { .. } | Self::Serialization { .. } => StatusCode::BAD_REQUEST,

            Self::Unauthorized => StatusCode::UNAUTHORIZED,

            Self::ConfigNotFound { .. } | Self::CredentialNotFound { .. } => StatusCode::NOT_FOUND,

            Self::ConfigValidation { .. } | Self::Internal { .. } | Self::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            Self::HttpClient { .. } => StatusCode::BAD_GATEWAY,

            Self::Unavailable | Self::RedisConnection { .. } => StatusCode::SERVICE_UNAVAILABLE,

            Self::RedisOperation { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Error type URI for the problem details body
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                "https://keypool.dev/errors/configuration"
            }
            Self::RedisConnection { .. }
            | Self::RedisOperation { .. }
            | Self::CredentialNotFound { .. } => "https://keypool.dev/errors/storage",
            Self::HttpClient { .. } => "https://keypool.dev/errors/network",
            Self::Unauthorized => "https://keypool.dev/errors/authentication",
            Self::Unavailable => "https://keypool.dev/errors/unavailable",
            _ => "https://keypool.dev/errors/internal",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ConfigValidation { .. } | Self::ConfigNotFound { .. } | Self::ConfigParse { .. } => {
                "Configuration Error"
            }
            Self::RedisConnection { .. }
            | Self::RedisOperation { .. }
            | Self::CredentialNotFound { .. } => "Storage Error",
            Self::HttpClient { .. } => "Network Error",
            Self::Unauthorized => "Authentication Error",
            Self::Unavailable => "Service Temporarily Unavailable",
            _ => "Internal Server Error",
        }
    }

    /// Log the error with a level matching its severity
    pub fn log(&self, request_id: Option<&str>) {
        let request_id = request_id.unwrap_or("unknown");

        if self.status_code().is_server_error() {
            error!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Application error occurred"
            );
        } else {
            warn!(
                error = %self,
                request_id = request_id,
                error_type = self.error_type(),
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        self.log(Some(&request_id));

        let status = self.status_code();
        let body = ErrorResponse {
            error_type: self.error_type().to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: self.to_string(),
            instance: format!("/errors/{request_id}"),
            request_id: Some(request_id),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for the crate
pub type Result<T, E = AppError> = std::result::Result<T, E>;
