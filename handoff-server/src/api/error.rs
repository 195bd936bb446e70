//! JSON error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::otc::{LoginError, StoreError, VerificationError};

/// Error returned by API handlers
///
/// Rendered as `{"error": <code>, "message": <text>}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NoSession,
    Expired,
    InvalidCode,
    StorageUnavailable(StoreError),
    DeliveryFailed(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::NoSession => (
                StatusCode::NOT_FOUND,
                "no_session",
                "No pending code; request a new one".to_string(),
            ),
            ApiError::Expired => (
                StatusCode::GONE,
                "expired",
                "Code expired; request a new one".to_string(),
            ),
            ApiError::InvalidCode => (
                StatusCode::UNAUTHORIZED,
                "invalid_code",
                "Invalid code".to_string(),
            ),
            ApiError::StorageUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_unavailable",
                "Login service temporarily unavailable".to_string(),
            ),
            ApiError::DeliveryFailed(_) => (
                StatusCode::BAD_GATEWAY,
                "delivery_failed",
                "Could not send the login code".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::StorageUnavailable(e) => error!("Session store failure: {}", e),
            ApiError::DeliveryFailed(e) => error!("Code delivery failure: {}", e),
            _ => {}
        }

        let (status, code, message) = self.parts();
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

impl From<VerificationError> for ApiError {
    fn from(e: VerificationError) -> Self {
        match e {
            VerificationError::NoSession => ApiError::NoSession,
            VerificationError::Expired => ApiError::Expired,
            VerificationError::Mismatch => ApiError::InvalidCode,
            VerificationError::Infrastructure(e) => ApiError::StorageUnavailable(e),
        }
    }
}

impl From<LoginError> for ApiError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::Store(e) => ApiError::StorageUnavailable(e),
            LoginError::Delivery(e) => ApiError::DeliveryFailed(e.to_string()),
        }
    }
}

impl From<handoff_common::Error> for ApiError {
    fn from(e: handoff_common::Error) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}
