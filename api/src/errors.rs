/// API error type and its JSON rendering.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use ninjax_shared::errors::{NinjaError, ValidationError};

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationError),
    Forbidden,
    NotFound(&'static str),
    FeatureDisabled,
    RateLimited,
    /// Downloader failure; reported with HTTP 200 and `success: false`.
    Upstream(NinjaError),
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<NinjaError> for ApiError {
    fn from(e: NinjaError) -> Self {
        match e {
            NinjaError::Validation(v) => ApiError::Validation(v),
            NinjaError::Cookie(_) | NinjaError::Config(_) | NinjaError::Io(_) | NinjaError::Json(_) => {
                ApiError::Internal(e.to_string())
            }
            other => ApiError::Upstream(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Access denied".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.to_string()),
            ApiError::FeatureDisabled => (StatusCode::NOT_FOUND, "Feature not enabled".to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string()),
            ApiError::Upstream(e) => {
                warn!("Downloader failed: {}", e);
                (StatusCode::OK, e.public_message())
            }
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}
