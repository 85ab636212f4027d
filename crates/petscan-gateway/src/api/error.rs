//! API error types and responses

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use petscan_worker::{InvokeError, WorkerError};

use crate::auth::AccountError;
use crate::storage::StorageError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// The uniform rejection for a missing or unusable identity
    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("Authentication required".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                msg.clone(),
                None,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
                None,
            ),
            ApiError::Worker(WorkerError::Analysis(err)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ANALYSIS_FAILED",
                err.message.clone(),
                err.traceback
                    .as_ref()
                    .map(|traceback| json!({ "traceback": traceback })),
            ),
            ApiError::Worker(WorkerError::Invoke(err)) => match err {
                InvokeError::Timeout { budget } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WORKER_TIMEOUT",
                    err.to_string(),
                    Some(json!({ "timeout_secs": budget.as_secs() })),
                ),
                InvokeError::WorkerFailed { exit_code, output } => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WORKER_FAILED",
                    match exit_code {
                        Some(code) => format!("Worker failed with exit code {}", code),
                        None => "Worker was terminated by a signal".to_string(),
                    },
                    Some(json!({ "exit_code": exit_code, "output": output })),
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "WORKER_UNAVAILABLE",
                    err.to_string(),
                    None,
                ),
            },
        };

        if status.is_server_error() {
            error!(code = code, error = %message, "Request failed");
        }

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(_) | AccountError::EmailTaken => {
                ApiError::BadRequest(err.to_string())
            }
            AccountError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AccountError::Hashing(_) | AccountError::Token(_) | AccountError::Storage(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(format!("Expected a multipart body: {}", rejection.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
