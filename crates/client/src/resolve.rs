//! Reference resolution: `key://`, URL or base64 into document text.
//!
//! Cached keys with `auto_refresh` re-resolve their source on every read.
//! A failed refresh is logged and the stale copy is served; the stored entry
//! is only ever replaced by a successful refresh.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use subrelay_core::{CacheEntry, Error, SubscriptionReference, SubscriptionStore};
use tokio::sync::Semaphore;

use crate::fetch::{FetchResponse, Fetcher, SUBSCRIPTION_USERINFO};

/// A resolved subscription document.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub raw_text: String,
    /// Usage header from upstream or cache metadata, forwarded verbatim.
    pub usage_info: Option<String>,
    pub status: u16,
    /// Upstream headers worth passing to the caller.
    pub passthrough: HeaderMap,
}

impl ResolvedDocument {
    fn from_entry(raw_text: String, usage_info: &str) -> Self {
        Self {
            raw_text,
            usage_info: (!usage_info.is_empty()).then(|| usage_info.to_string()),
            status: 200,
            passthrough: HeaderMap::new(),
        }
    }
}

/// Reference label safe to log: never the full URL or token.
pub fn describe(reference: &str) -> String {
    match SubscriptionReference::classify(reference) {
        SubscriptionReference::Cached(key) => format!("key://{key}"),
        SubscriptionReference::Direct(url) => match ::url::Url::parse(&url) {
            Ok(parsed) => format!("direct:{}", parsed.host_str().unwrap_or("?")),
            Err(_) => "direct:?".to_string(),
        },
        SubscriptionReference::Encoded(blob) => format!("encoded:{}", blob.chars().take(8).collect::<String>()),
    }
}

/// Resolves references through the cache store and the fetch client.
#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn SubscriptionStore>,
    fetcher: Arc<dyn Fetcher>,
    default_user_agent: String,
}

impl Resolver {
    pub fn new(
        store: Arc<dyn SubscriptionStore>, fetcher: Arc<dyn Fetcher>, default_user_agent: impl Into<String>,
    ) -> Self {
        Self { store, fetcher, default_user_agent: default_user_agent.into() }
    }

    pub fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    pub fn default_user_agent(&self) -> &str {
        &self.default_user_agent
    }

    /// Request headers for a subscription fetch.
    pub fn request_headers(&self, user_agent: Option<&str>) -> HeaderMap {
        let user_agent = user_agent.filter(|ua| !ua.trim().is_empty()).unwrap_or(&self.default_user_agent);
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            headers.insert(header::USER_AGENT, value);
        } else {
            tracing::warn!("identification header is not a valid header value, using default");
            if let Ok(value) = HeaderValue::from_str(&self.default_user_agent) {
                headers.insert(header::USER_AGENT, value);
            }
        }
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers
    }

    /// Resolve a reference into document text.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown key
    /// - `CacheCorrupt` for a key without a document
    /// - `BadInput` for undecodable base64
    /// - `Upstream` with the remote status for a non-200 answer
    /// - `Transport` for timeouts and connection failures
    pub async fn resolve(&self, reference: &str, user_agent: Option<&str>) -> Result<ResolvedDocument, Error> {
        let classified = SubscriptionReference::classify(reference);
        tracing::debug!(reference = %describe(reference), kind = classified.kind(), "resolving subscription");

        match classified {
            SubscriptionReference::Cached(key) => self.resolve_cached(&key, user_agent).await,
            other => self.fetch_remote(&other, user_agent).await,
        }
    }

    /// Resolve several references concurrently, returning results in input order.
    pub async fn resolve_all(
        &self, references: &[String], user_agent: Option<&str>, max_concurrency: usize,
    ) -> Vec<Result<ResolvedDocument, Error>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
        let user_agent = user_agent.map(str::to_string);

        let handles: Vec<_> = references
            .iter()
            .map(|reference| {
                let resolver = self.clone();
                let semaphore = semaphore.clone();
                let reference = reference.clone();
                let user_agent = user_agent.clone();
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::Transport(format!("fetch pool closed: {e}")))?;
                    resolver.resolve(&reference, user_agent.as_deref()).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(Error::Transport(format!("fetch task failed: {e}"))));
            results.push(result);
        }
        results
    }

    /// GET `url` with default headers, whatever the answer status.
    pub async fn fetch_raw(&self, url: &str) -> Result<FetchResponse, Error> {
        self.fetcher.fetch(url, &self.request_headers(None)).await
    }

    async fn read_entry(&self, key: &str) -> Result<(CacheEntry, String), Error> {
        let entry = self.store.get(key).await?.ok_or_else(|| {
            tracing::error!(key, "cache key not found");
            Error::NotFound(format!("key://{key}"))
        })?;
        let Some(raw_text) = entry.raw_text.clone() else {
            tracing::error!(key, "cache entry has no document");
            return Err(Error::CacheCorrupt(format!("key://{key} has no document")));
        };
        Ok((entry, raw_text))
    }

    async fn resolve_cached(&self, key: &str, user_agent: Option<&str>) -> Result<ResolvedDocument, Error> {
        let (entry, raw_text) = self.read_entry(key).await?;

        if entry.refreshable() {
            match self.refresh(key, &entry, user_agent).await {
                Ok(fresh) => return Ok(fresh),
                Err(e) => {
                    tracing::warn!(
                        key,
                        source = %describe(&entry.source_reference),
                        stage = "refresh",
                        error = %e,
                        "refresh failed, serving cached copy"
                    );
                }
            }
        }

        tracing::info!(key, cached_at = %entry.cached_at, "serving cached subscription");
        Ok(ResolvedDocument::from_entry(raw_text, &entry.usage_info))
    }

    /// Re-resolve an entry's source once and store the result under `key`.
    async fn refresh(&self, key: &str, entry: &CacheEntry, user_agent: Option<&str>) -> Result<ResolvedDocument, Error> {
        let fresh = match SubscriptionReference::classify(&entry.source_reference) {
            SubscriptionReference::Cached(source_key) if source_key == key => {
                return Err(Error::BadInput(format!("key://{key} refers to itself")));
            }
            SubscriptionReference::Cached(source_key) => {
                let (source, raw_text) = self.read_entry(&source_key).await?;
                ResolvedDocument::from_entry(raw_text, &source.usage_info)
            }
            other => self.fetch_remote(&other, user_agent).await?,
        };

        let updated = CacheEntry::new(
            entry.source_reference.clone(),
            fresh.raw_text.clone(),
            fresh.usage_info.clone().unwrap_or_default(),
            entry.auto_refresh,
        );
        self.store.put(key, updated).await?;

        tracing::info!(key, bytes = fresh.raw_text.len(), "refreshed cached subscription");
        Ok(fresh)
    }

    async fn fetch_remote(
        &self, reference: &SubscriptionReference, user_agent: Option<&str>,
    ) -> Result<ResolvedDocument, Error> {
        let url = reference.remote_url()?.ok_or_else(|| Error::BadInput("not a remote reference".into()))?;
        let response = self.fetcher.fetch(&url, &self.request_headers(user_agent)).await?;

        if response.status != 200 {
            tracing::error!(kind = reference.kind(), status = response.status, "subscription download failed");
            return Err(Error::Upstream { url: describe(&url), status: response.status });
        }

        let raw_text = response.text();
        tracing::info!(kind = reference.kind(), bytes = raw_text.len(), "subscription downloaded");

        Ok(ResolvedDocument {
            raw_text,
            usage_info: response.header(SUBSCRIPTION_USERINFO).map(str::to_string),
            status: 200,
            passthrough: response.passthrough_headers(),
        })
    }
}
