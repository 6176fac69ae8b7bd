//! Error types for the background removal pipeline
//!
//! Every pipeline stage reports failures through [`Error`]; the
//! [`IntoResponse`] implementation is the single place failure kinds are
//! translated into HTTP status codes and the uniform `{"error": ...}`
//! envelope. Stages themselves never choose a status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy of the request pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or incorrect API key
    #[error("Invalid or missing API key")]
    Auth,

    /// Missing multipart field, undecodable bytes, or unsupported format
    #[error("{0}")]
    Validation(String),

    /// Binary upload exceeds the input size ceiling
    #[error("Image too large. Maximum size is 10MB.")]
    PayloadTooLarge,

    /// Remote acquisition failure (network, status, timeout, oversize)
    #[error("{0}")]
    Download(String),

    /// Background removal backend failure
    #[error("{0}")]
    Processing(String),

    /// Object storage upload or URL resolution failure
    #[error("{0}")]
    Storage(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        Self::Download(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Fixed HTTP status for this failure kind
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Download(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Processing(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = ?status, error = %self, "pipeline stage failed");
        } else {
            tracing::warn!(kind = ?status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
