use super::wire::{ErrorBody, ErrorResponse};
use crate::error::ErrorCategory;
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Transport wrapper that renders an [`Error`] as a JSON error envelope.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self(Error::PayloadTooLarge(rejection.body_text()));
        }
        Self(Error::InvalidRequest(rejection.body_text()))
    }
}

pub(super) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
        Error::ConnectionFailed(_) | Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        other => match other.category() {
            ErrorCategory::Caller => StatusCode::BAD_REQUEST,
            ErrorCategory::Backend => StatusCode::BAD_GATEWAY,
            ErrorCategory::Transient => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: self.0.code().to_string(),
                    category: self.0.category().as_str().to_string(),
                    message: self.0.to_string(),
                },
            }),
        )
            .into_response()
    }
}
