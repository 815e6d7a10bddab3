//! `GET /convert`: convert, merge, cover, sanitize.
//!
//! Query: `url` (required), `config`, `backend`, `cover`, `ua` and repeated
//! `mix_subs`. The answer is always a `config.yaml` attachment.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderValue, header};
use axum::response::Response;
use subrelay_client::ConvertRequest;

use super::document_response;
use crate::app::AppState;
use crate::error::ApiError;
use crate::query::QueryParams;

const CONTENT_TYPE: &str = "text/yaml; charset=utf-8";
const DISPOSITION: &str = "attachment; filename=config.yaml";

pub fn parse(query: &QueryParams) -> Result<ConvertRequest, ApiError> {
    Ok(ConvertRequest {
        reference: query.required("url")?,
        config: query.first("config"),
        backend: query.first("backend"),
        cover: query.first("cover"),
        mix_subs: query.list("mix_subs"),
        user_agent: query.first("ua"),
    })
}

pub async fn handler(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Result<Response, ApiError> {
    let req = parse(&QueryParams::parse(raw.as_deref()))?;
    tracing::info!(
        reference = %subrelay_client::describe(&req.reference),
        cover = req.cover.is_some(),
        mix_subs = req.mix_subs.len(),
        "convert request"
    );

    let output = state.relay.convert(&req).await?;
    let mut response = document_response(output, CONTENT_TYPE);
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, HeaderValue::from_static(DISPOSITION));
    Ok(response)
}
