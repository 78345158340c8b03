use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use serde::Serialize;
use thiserror::Error;

use crate::error::StoreError;

/// Errors returned to HTTP clients
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidBody(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidApiKey(String),

    #[error("A device with id '{0}' could not be found")]
    DeviceNotFound(String),

    #[error("{message}")]
    Database {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    status: &'static str,
    error_code: &'static str,
    message: String,
}

impl ApiError {
    pub fn database(message: &'static str, source: StoreError) -> Self {
        ApiError::Database { message, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidApiKey(_) => StatusCode::FORBIDDEN,
            ApiError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::InvalidBody(_) => "InvalidBody",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::InvalidApiKey(_) => "InvalidApiKey",
            ApiError::DeviceNotFound(_) => "DeviceNotFound",
            ApiError::Database { .. } => "DatabaseError",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(format!("The request body is malformed: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Causes stay in the log, clients only get the message
        match &self {
            ApiError::Database { source, .. } => error!("{}: {}", self, source),
            _ => warn!("{}: {}", self.error_code(), self),
        }

        let body = ErrorBody {
            status_code: status.as_u16(),
            status: status.canonical_reason().unwrap_or("Unknown"),
            error_code: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
