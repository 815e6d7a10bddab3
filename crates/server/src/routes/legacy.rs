//! `GET /clash?url=<base64>`: raw passthrough kept for old clients.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::app::AppState;
use crate::error::ApiError;
use crate::query::QueryParams;

pub async fn handler(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Result<Response, ApiError> {
    let blob = QueryParams::parse(raw.as_deref()).required("url")?;
    let output = state.relay.passthrough(&blob).await?;
    let status = StatusCode::from_u16(output.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, output.body).into_response())
}
