//! In-memory fetcher for resolver and relay tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use subrelay_core::Error;

use crate::fetch::{FetchResponse, Fetcher};

#[derive(Clone)]
struct Scripted {
    status: u16,
    body: String,
    headers: HeaderMap,
    delay: Option<Duration>,
}

/// Answers from a fixed URL table; unknown URLs fail like a dead host.
///
/// A URL with a query also matches a route registered without one.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    routes: HashMap<String, Scripted>,
    calls: Mutex<Vec<(String, HeaderMap)>>,
    finished: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_response(mut self, url: &str, status: u16, body: &str, headers: &[(&'static str, &str)]) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        self.routes.insert(url.to_string(), Scripted { status, body: body.to_string(), headers: map, delay: None });
        self
    }

    pub(crate) fn with_body(self, url: &str, body: &str) -> Self {
        self.with_response(url, 200, body, &[])
    }

    pub(crate) fn with_usage(self, url: &str, body: &str, usage: &str) -> Self {
        self.with_response(url, 200, body, &[("subscription-userinfo", usage)])
    }

    pub(crate) fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, status, "error", &[])
    }

    /// Hold the answer for `url` back by `delay`. The route must exist.
    pub(crate) fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        if let Some(route) = self.routes.get_mut(url) {
            route.delay = Some(delay);
        }
        self
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub(crate) fn user_agents(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, headers)| headers.get(header::USER_AGENT))
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    /// URLs in the order their answers were handed out.
    pub(crate) fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<FetchResponse, Error> {
        self.calls.lock().unwrap().push((url.to_string(), headers.clone()));

        let base = url.split('?').next().unwrap_or(url);
        let scripted = self
            .routes
            .get(url)
            .or_else(|| self.routes.get(base))
            .cloned()
            .ok_or_else(|| Error::Transport(format!("connection refused: {url}")))?;

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        self.finished.lock().unwrap().push(url.to_string());

        Ok(FetchResponse {
            url: url.to_string(),
            status: scripted.status,
            bytes: Bytes::from(scripted.body),
            headers: scripted.headers,
        })
    }
}
