//! HTTP error mapping
//!
//! Every credential rejection collapses to one indistinguishable 401 so that
//! clients cannot learn why a credential failed. Store and signing faults are
//! 500s; they are never reported as "unauthorized".

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Body sent with every 401.
pub const UNAUTHORIZED_DETAIL: &str = "Could not validate credentials";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("too many pending logins")]
    Unavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<credential::Error> for ApiError {
    fn from(err: credential::Error) -> Self {
        match err {
            credential::Error::Unauthorized(_) => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<stores::Error> for ApiError {
    fn from(err: stores::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [
                    (header::WWW_AUTHENTICATE, "Bearer"),
                    (header::CONTENT_TYPE, "application/json"),
                ],
                serde_json::json!({ "detail": UNAUTHORIZED_DETAIL }).to_string(),
            )
                .into_response(),
            ApiError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "application/json")],
                serde_json::json!({ "detail": "too many pending logins" }).to_string(),
            )
                .into_response(),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                serde_json::json!({ "detail": "internal server error" }).to_string(),
            )
                .into_response(),
        }
    }
}
