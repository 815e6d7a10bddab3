//! `POST /register`: store a subscription under a short key.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use subrelay_client::{RegisterReceipt, RegisterRequest};

use crate::app::AppState;
use crate::error::ApiError;

/// Request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBody {
    /// Key the document is stored under, without `key://`.
    pub key: String,

    /// Reference to resolve now and on refresh.
    #[serde(default)]
    pub url: Option<String>,

    /// Uploaded document, stored verbatim.
    #[serde(default)]
    pub content: Option<String>,

    /// Re-resolve `url` on every read.
    #[serde(default)]
    pub auto_refresh: bool,

    /// Identification header for the initial fetch.
    #[serde(default)]
    pub ua: Option<String>,
}

impl From<RegisterBody> for RegisterRequest {
    fn from(body: RegisterBody) -> Self {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        RegisterRequest {
            key: body.key,
            reference: non_empty(body.url),
            content: body.content,
            auto_refresh: body.auto_refresh,
            user_agent: non_empty(body.ua),
        }
    }
}

pub async fn handler(
    State(state): State<Arc<AppState>>, payload: Result<Json<RegisterBody>, JsonRejection>,
) -> Result<Json<RegisterReceipt>, ApiError> {
    let Json(body) = payload?;
    let receipt = state.relay.register(&RegisterRequest::from(body)).await?;
    Ok(Json(receipt))
}
