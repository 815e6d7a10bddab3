//! Service index and health.

use axum::Json;
use serde_json::{Value, json};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn index() -> Json<Value> {
    Json(json!({
        "service": "subrelay",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "/sub": "GET - resolve a subscription (url, ua, apply_sub)",
            "/convert": "GET - convert and patch a subscription (url, config, backend, cover, mix_subs, ua)",
            "/register": "POST - store a subscription under a key ({key, url | content, auto_refresh})",
            "/clash": "GET - raw passthrough of a base64-encoded URL (url)",
            "/health": "GET - health check",
        },
    }))
}
