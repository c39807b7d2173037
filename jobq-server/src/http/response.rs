//! Maps the core error taxonomy onto HTTP status codes, per the propagation policy: the
//! Coordinator is the single translation layer into user-facing status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::Error;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: detail.into() })).into_response()
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            Error::BadMode(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidWorkload(_) => StatusCode::NOT_FOUND,
            Error::PodNotReady => StatusCode::BAD_REQUEST,
            Error::UnsupportedKind(_) => StatusCode::BAD_REQUEST,
            Error::APIError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::StopFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {self}");
        }
        error_response(status, self.to_string())
    }
}
