//! Structured errors for the subrelay server.
//!
//! Every failure leaves the server as `{"error": <message>, "code": <status>}`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use subrelay_core::Error;

/// Errors a route can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A pipeline failure; the status comes from the error itself.
    #[error(transparent)]
    Relay(#[from] Error),

    /// Request body could not be decoded.
    #[error("BAD_INPUT: {0}")]
    InvalidBody(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Relay(err) => StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::error!(code = status.as_u16(), error = %self, "request failed");
        let body = ErrorBody { error: self.to_string(), code: status.as_u16() };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(Error::BadInput("x".into())).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(Error::NotFound("k".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(Error::Upstream { url: "direct:a".into(), status: 403 }).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::from(Error::Transport("t".into())).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ApiError::InvalidBody("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_upstream_code_falls_back() {
        let err = ApiError::from(Error::Upstream { url: "direct:a".into(), status: 42 });
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_response_status() {
        let response = ApiError::from(Error::NotFound("key://k".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
