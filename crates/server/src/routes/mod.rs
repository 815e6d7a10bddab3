//! HTTP route handlers.
//!
//! Each handler parses its inputs, calls one relay pipeline and shapes the
//! response. Failures are returned as `ApiError`.

pub mod convert;
pub mod legacy;
pub mod meta;
pub mod register;
pub mod sub;

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use subrelay_client::RelayOutput;

/// Document body with its passthrough headers and a fixed content type.
pub(crate) fn document_response(output: RelayOutput, content_type: &'static str) -> Response {
    let mut headers: HeaderMap = output.headers;
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    (headers, output.body).into_response()
}
