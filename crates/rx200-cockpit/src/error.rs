//! HTTP error mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rx200_types::BridgeError;
use serde::Serialize;
use tracing::error;

/// Body sent to callers when an internal fault occurs.  Details stay in the
/// server log.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// Request shape or value violation (400).
    BadRequest(String),
    /// A motion sequence already holds the dispatcher (409).
    Conflict(String),
    /// Anything else (500).  The string is logged, never returned.
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ApiErrorBody { error: &msg })).into_response()
            }
            ApiError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(ApiErrorBody { error: &msg })).into_response()
            }
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiErrorBody {
                        error: INTERNAL_ERROR_MESSAGE,
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::InvalidCommand(msg) => ApiError::BadRequest(msg),
            BridgeError::SequenceBusy => ApiError::Conflict(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
