use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::{media::MediaError, payments::PaymentError};

pub const NOT_AUTHORIZED: &str = "Not Authorized Login Again";

/// Every handler failure, rendered as `{ "success": false, "message": ... }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Image upload failed: {0}")]
    Media(#[from] MediaError),

    #[error("Payment gateway error: {0}")]
    Payment(#[from] PaymentError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized(NOT_AUTHORIZED.to_string())
    }

    fn message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Media(MediaError::Disabled) | Self::Payment(PaymentError::Disabled(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Payment(PaymentError::InvalidSignature | PaymentError::InvalidReference(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Media(_) | Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        }
        HttpResponse::build(status).json(json!({
            "success": false,
            "message": self.message(),
        }))
    }
}
