//! HTTP error handling and response types.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::models::FieldErrors;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Per-field messages of a rejected write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            fields: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_fields(mut self, fields: FieldErrors) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Payload could not be decoded into the entity's fields
    Validation(FieldErrors),
    /// Missing or rejected credentials
    Unauthorized(String),
    /// Internal server error
    Internal(String),
    /// Repository error
    Repository(RepositoryError),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::Validation(fields) => validation(fields),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::new("UNAUTHORIZED", msg))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", msg),
            ),
            AppError::Repository(err) => repository_error(err),
        }
    }
}

fn validation(fields: FieldErrors) -> (StatusCode, ApiError) {
    (
        StatusCode::BAD_REQUEST,
        ApiError::new("VALIDATION_ERROR", "Invalid input.").with_fields(fields),
    )
}

fn repository_error(err: RepositoryError) -> (StatusCode, ApiError) {
    let context = err.context().to_string();
    match err {
        RepositoryError::NotFound { message, .. } => {
            (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
        }
        RepositoryError::ValidationError { fields, .. } => validation(fields),
        RepositoryError::IntegrityError { message, .. } => (
            StatusCode::CONFLICT,
            ApiError::new("INTEGRITY_ERROR", message).with_details(context),
        ),
        RepositoryError::ConnectionError { message, .. }
        | RepositoryError::TimeoutError { message, .. } => {
            tracing::error!(%message, %context, "repository unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::new("UNAVAILABLE", "The database is unavailable.")
                    .with_details(message),
            )
        }
        other => {
            tracing::error!(error = %other, "repository failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", other.to_string()),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_body();
        if status == StatusCode::UNAUTHORIZED {
            return (
                status,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"api\"")],
                Json(error),
            )
                .into_response();
        }
        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<FieldErrors> for AppError {
    fn from(fields: FieldErrors) -> Self {
        AppError::Validation(fields)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
