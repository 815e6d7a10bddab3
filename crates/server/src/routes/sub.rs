//! `GET /sub`: fetch-and-return.
//!
//! Query: `url` (required), `ua`, repeated `apply_sub`.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::response::Response;
use subrelay_client::SubscriptionRequest;

use super::document_response;
use crate::app::AppState;
use crate::error::ApiError;
use crate::query::QueryParams;

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

pub fn parse(query: &QueryParams) -> Result<SubscriptionRequest, ApiError> {
    Ok(SubscriptionRequest {
        reference: query.required("url")?,
        user_agent: query.first("ua"),
        apply_subs: query.list("apply_sub"),
    })
}

pub async fn handler(State(state): State<Arc<AppState>>, RawQuery(raw): RawQuery) -> Result<Response, ApiError> {
    let req = parse(&QueryParams::parse(raw.as_deref()))?;
    tracing::info!(
        reference = %subrelay_client::describe(&req.reference),
        secondaries = req.apply_subs.len(),
        "sub request"
    );

    let output = state.relay.subscription(&req).await?;
    Ok(document_response(output, CONTENT_TYPE))
}
