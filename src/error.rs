/// Unified error types for Notekeep
use crate::session::TokenError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum NoteError {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Account already registered for this email
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// No outstanding passcode, or it is past its expiry
    #[error("Expired: {0}")]
    Expired(String),

    /// Presented passcode differs from the stored one
    #[error("Mismatch: {0}")]
    Mismatch(String),

    /// Passcode could not be handed to the mail channel
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Bearer credential missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] TokenError),

    /// Identity provider or HTTP upstream failure
    #[error("Upstream failure: {0}")]
    Upstream(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl NoteError {
    /// Status code and stable error code for this error
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            NoteError::Validation(_) => (StatusCode::BAD_REQUEST, "InvalidRequest"),
            NoteError::AlreadyExists(_) => (StatusCode::CONFLICT, "AlreadyExists"),
            NoteError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            NoteError::Expired(_) => (StatusCode::BAD_REQUEST, "Expired"),
            NoteError::Mismatch(_) => (StatusCode::BAD_REQUEST, "Mismatch"),
            NoteError::Unauthorized(TokenError::Missing) => {
                (StatusCode::UNAUTHORIZED, "MissingCredential")
            }
            NoteError::Unauthorized(TokenError::Invalid) => {
                (StatusCode::UNAUTHORIZED, "InvalidCredential")
            }
            NoteError::Unauthorized(TokenError::Expired) => {
                (StatusCode::UNAUTHORIZED, "ExpiredCredential")
            }
            NoteError::DeliveryFailed(_)
            | NoteError::Upstream(_)
            | NoteError::Database(_)
            | NoteError::Io(_)
            | NoteError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalServerError")
            }
        }
    }

    /// Message shown to the client. Domain errors carry their own text,
    /// infrastructure failures collapse into one generic message.
    fn public_message(&self) -> String {
        match self {
            NoteError::Validation(msg)
            | NoteError::AlreadyExists(msg)
            | NoteError::NotFound(msg)
            | NoteError::Expired(msg)
            | NoteError::Mismatch(msg) => msg.clone(),
            NoteError::Unauthorized(e) => e.to_string(),
            NoteError::DeliveryFailed(_) => "Failed to send OTP".to_string(),
            _ => "Server error".to_string(),
        }
    }
}

/// Unreadable request bodies get the same JSON error shape as everything else
impl From<JsonRejection> for NoteError {
    fn from(rejection: JsonRejection) -> Self {
        NoteError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// Convert NoteError to HTTP response
impl IntoResponse for NoteError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message: self.public_message(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type NoteResult<T> = Result<T, NoteError>;
