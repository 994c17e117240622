use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error, warn};

use super::types::ErrorBody;
use crate::session::SessionError;
use crate::state::Readiness;
use crate::vision::VisionError;

/// Every failure a route can report, each with its own status
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("service is not ready (state: {0})")]
    NotReady(Readiness),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Vision(VisionError::Decode(_)) => StatusCode::BAD_REQUEST,
            ApiError::Vision(VisionError::Detection(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Vision(VisionError::Classification(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Session(SessionError::InvalidId(_)) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::TooMany { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable discriminator for the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Vision(VisionError::Decode(_)) => "decode_error",
            ApiError::Vision(VisionError::Detection(_)) => "detection_error",
            ApiError::Vision(VisionError::Classification(_)) => "classification_error",
            ApiError::Session(SessionError::InvalidId(_)) => "invalid_session",
            ApiError::Session(SessionError::TooMany { .. }) => "too_many_sessions",
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NotReady(_) => "not_ready",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(code = self.code(), %message, "request failed");
        } else if status.is_server_error() {
            warn!(code = self.code(), %message, "request failed");
        } else {
            debug!(code = self.code(), %message, "request rejected");
        }

        let body = ErrorBody {
            success: false,
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
