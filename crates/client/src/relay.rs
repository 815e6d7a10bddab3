//! Request pipelines: fetch-and-return, convert, register and passthrough.
//!
//! Convert runs its stages strictly in order:
//!
//! 1. resolve references and call the conversion endpoint
//! 2. merge `mix_subs` proxies, then re-serialize
//! 3. apply the cover document, then re-serialize
//! 4. quote bare `short-id` values
//!
//! Optional stages report skips without failing. Anything else aborts the
//! request; partial output is never returned.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use subrelay_core::reference::KEY_SCHEME;
use subrelay_core::yaml::{self, Secondary};
use subrelay_core::{AppConfig, CacheEntry, Error, SubscriptionReference, SubscriptionStore};

use crate::convert::ConversionRequest;
use crate::fetch::{FetchConfig, FetchClient, Fetcher};
use crate::resolve::{ResolvedDocument, Resolver, describe};

/// Settings the pipelines need from the application config.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub max_concurrency: usize,
    pub converter_url: String,
    pub public_base_url: Option<String>,
}

impl From<&AppConfig> for RelaySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            converter_url: config.converter_url.clone(),
            public_base_url: config.require_public_base_url().ok().map(str::to_string),
        }
    }
}

/// Fetch-and-return request.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRequest {
    pub reference: String,
    pub user_agent: Option<String>,
    /// Secondary references whose proxies are appended.
    pub apply_subs: Vec<String>,
}

/// Convert request.
#[derive(Debug, Clone, Default)]
pub struct ConvertRequest {
    pub reference: String,
    pub config: Option<String>,
    pub backend: Option<String>,
    pub cover: Option<String>,
    pub mix_subs: Vec<String>,
    pub user_agent: Option<String>,
}

/// Register request; exactly one of `reference` and `content` is set.
#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    pub key: String,
    pub reference: Option<String>,
    pub content: Option<String>,
    pub auto_refresh: bool,
    pub user_agent: Option<String>,
}

/// Acknowledgement of a registration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RegisterReceipt {
    pub key: String,
    pub cached_at: String,
    pub bytes: usize,
    pub auto_refresh: bool,
}

/// A finished document and the upstream headers that go with it.
#[derive(Debug, Clone)]
pub struct RelayOutput {
    pub body: String,
    pub headers: HeaderMap,
}

/// Raw upstream answer for the legacy passthrough route.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub status: u16,
    pub body: Bytes,
}

/// Orchestrates the resolver, the converter and the document passes.
#[derive(Clone)]
pub struct Relay {
    resolver: Resolver,
    converter: Arc<dyn Fetcher>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(resolver: Resolver, converter: Arc<dyn Fetcher>, settings: RelaySettings) -> Self {
        Self { resolver, converter, settings }
    }

    /// Build a relay from config: one fetch client per timeout class.
    pub fn from_config(config: &AppConfig, store: Arc<dyn SubscriptionStore>) -> Result<Self, Error> {
        let subscriptions = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.fetch_timeout(),
            ..Default::default()
        })?;
        let converter = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.convert_timeout(),
            ..Default::default()
        })?;

        let resolver = Resolver::new(store, Arc::new(subscriptions), config.user_agent.clone());
        Ok(Self::new(resolver, Arc::new(converter), RelaySettings::from(config)))
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Resolve a subscription and optionally merge secondary proxies into it.
    ///
    /// Without secondaries the document is returned byte for byte.
    pub async fn subscription(&self, req: &SubscriptionRequest) -> Result<RelayOutput, Error> {
        let primary = self.resolver.resolve(&req.reference, req.user_agent.as_deref()).await?;
        let headers = document_headers(&primary);

        if req.apply_subs.is_empty() {
            return Ok(RelayOutput { body: primary.raw_text, headers });
        }

        let merged = self
            .merge_secondaries(&primary.raw_text, &req.apply_subs, req.user_agent.as_deref())
            .await?;
        Ok(RelayOutput { body: yaml::sanitize_short_ids(&merged), headers })
    }

    /// Convert a subscription through the conversion endpoint and patch the result.
    pub async fn convert(&self, req: &ConvertRequest) -> Result<RelayOutput, Error> {
        let subscription_url = self.converter_visible_url(&req.reference)?;
        let config_url = req
            .config
            .as_deref()
            .map(|config| self.converter_visible_url(config))
            .transpose()?;
        let endpoint = match req.backend.as_deref() {
            Some(backend) => SubscriptionReference::classify(backend)
                .remote_url()?
                .ok_or_else(|| Error::BadInput("conversion backend cannot be a cache key".into()))?,
            None => self.settings.converter_url.clone(),
        };

        let conversion = ConversionRequest::new(&endpoint, subscription_url, config_url)?;
        let url = conversion.to_url();
        tracing::info!(backend = %describe(conversion.endpoint.as_str()), stage = "convert", "calling conversion endpoint");

        let response = self
            .converter
            .fetch(url.as_str(), &self.resolver.request_headers(req.user_agent.as_deref()))
            .await
            .inspect_err(|e| tracing::error!(stage = "convert", error = %e, "conversion endpoint unreachable"))?;
        if response.status != 200 {
            tracing::error!(stage = "convert", status = response.status, "conversion endpoint failed");
            return Err(Error::Upstream { url: describe(conversion.endpoint.as_str()), status: response.status });
        }

        let mut headers = response.passthrough_headers();
        headers.remove(header::CONTENT_DISPOSITION);

        let mut text = yaml::sanitize_short_ids(&response.text());

        if !req.mix_subs.is_empty() {
            text = self.merge_secondaries(&text, &req.mix_subs, req.user_agent.as_deref()).await?;
        }

        if let Some(cover) = req.cover.as_deref() {
            text = self.apply_cover(&text, cover, req.user_agent.as_deref()).await?;
        }

        Ok(RelayOutput { body: yaml::sanitize_short_ids(&text), headers })
    }

    /// Store a document under a short key.
    pub async fn register(&self, req: &RegisterRequest) -> Result<RegisterReceipt, Error> {
        let key = req.key.trim();
        if key.is_empty() {
            return Err(Error::BadInput("key must not be empty".into()));
        }
        if key.starts_with(KEY_SCHEME) || key.chars().any(char::is_whitespace) {
            return Err(Error::BadInput(format!("invalid key: {key}")));
        }

        let entry = match (req.reference.as_deref(), req.content.as_deref()) {
            (Some(_), Some(_)) => return Err(Error::BadInput("provide either url or content, not both".into())),
            (None, None) => return Err(Error::BadInput("missing url or content".into())),
            (Some(reference), None) => {
                if SubscriptionReference::classify(reference) == SubscriptionReference::Cached(key.to_string()) {
                    return Err(Error::BadInput(format!("key://{key} cannot refer to itself")));
                }
                let doc = self.resolver.resolve(reference, req.user_agent.as_deref()).await?;
                CacheEntry::new(reference.trim(), doc.raw_text, doc.usage_info.unwrap_or_default(), req.auto_refresh)
            }
            (None, Some(content)) => CacheEntry::new("", content, "", false),
        };

        let receipt = RegisterReceipt {
            key: key.to_string(),
            cached_at: entry.cached_at.clone(),
            bytes: entry.raw_text.as_ref().map_or(0, String::len),
            auto_refresh: entry.auto_refresh,
        };
        self.resolver.store().put(key, entry).await?;

        tracing::info!(key, bytes = receipt.bytes, auto_refresh = receipt.auto_refresh, "registered subscription");
        Ok(receipt)
    }

    /// Fetch a base64-encoded URL and hand back whatever it answered.
    pub async fn passthrough(&self, blob: &str) -> Result<RawOutput, Error> {
        let url = subrelay_core::reference::decode_url(blob)?;
        let response = self
            .resolver
            .fetch_raw(&url)
            .await
            .inspect_err(|e| tracing::error!(stage = "passthrough", error = %e, "request failed"))?;
        tracing::info!(stage = "passthrough", status = response.status, "passthrough request finished");
        Ok(RawOutput { status: response.status, body: response.bytes })
    }

    /// URL a remote converter can fetch for `reference`.
    ///
    /// Cache keys are served back through this relay's `/sub` route.
    fn converter_visible_url(&self, reference: &str) -> Result<String, Error> {
        match SubscriptionReference::classify(reference) {
            SubscriptionReference::Cached(key) => {
                let base = self.settings.public_base_url.as_deref().ok_or_else(|| {
                    Error::BadInput("key:// references need public_base_url to be converted".into())
                })?;
                let mut url = url::Url::parse(&format!("{}/sub", base.trim_end_matches('/')))
                    .map_err(|e| Error::BadInput(format!("public_base_url: {e}")))?;
                url.query_pairs_mut().append_pair("url", &format!("{KEY_SCHEME}{key}"));
                Ok(url.to_string())
            }
            other => other
                .remote_url()?
                .ok_or_else(|| Error::BadInput("unresolvable reference".into())),
        }
    }

    /// Merge secondaries into `primary_text` and re-serialize.
    async fn merge_secondaries(
        &self, primary_text: &str, references: &[String], user_agent: Option<&str>,
    ) -> Result<String, Error> {
        let mut primary = yaml::parse_mapping(&yaml::sanitize_short_ids(primary_text))
            .inspect_err(|e| tracing::error!(stage = "merge", error = %e, "primary document unusable"))?;

        let resolved = self
            .resolver
            .resolve_all(references, user_agent, self.settings.max_concurrency)
            .await;
        let secondaries = references.iter().zip(resolved).map(|(reference, result)| {
            let document = result.and_then(|doc| yaml::parse_value(&yaml::sanitize_short_ids(&doc.raw_text)));
            Secondary::new(describe(reference), document)
        });

        let report = yaml::merge_proxies(&mut primary, secondaries)?;
        tracing::info!(
            stage = "merge",
            appended = report.appended,
            skipped = report.skipped(),
            "merged secondary subscriptions"
        );

        yaml::to_text(&primary)
    }

    /// Fetch the cover document and apply it onto `text`.
    async fn apply_cover(&self, text: &str, cover_reference: &str, user_agent: Option<&str>) -> Result<String, Error> {
        let mut primary = yaml::parse_mapping(text)
            .inspect_err(|e| tracing::error!(stage = "cover", error = %e, "primary document unusable"))?;

        let cover_doc = self.resolver.resolve(cover_reference, user_agent).await.inspect_err(|e| {
            tracing::error!(stage = "cover", source = %describe(cover_reference), error = %e, "cover fetch failed")
        })?;
        let cover = yaml::parse_mapping(&yaml::sanitize_short_ids(&cover_doc.raw_text))?;

        let report = yaml::apply_cover(&mut primary, &serde_yaml::Value::Mapping(cover));
        for step in &report.steps {
            tracing::info!(stage = step.stage(), applied = step.is_applied(), "cover step finished");
        }

        yaml::to_text(&primary)
    }
}

/// Passthrough headers plus the usage header for a resolved document.
fn document_headers(doc: &ResolvedDocument) -> HeaderMap {
    let mut headers = doc.passthrough.clone();
    if let Some(usage) = doc.usage_info.as_deref()
        && let Ok(value) = HeaderValue::from_str(usage)
    {
        headers.insert(crate::fetch::SUBSCRIPTION_USERINFO, value);
    }
    headers
}
