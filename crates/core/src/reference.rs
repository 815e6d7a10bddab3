//! Classification of caller-supplied subscription references.
//!
//! A reference is one of three things:
//! - `key://<name>`: a registered cache key
//! - `http://...` / `https://...`: a URL used verbatim
//! - anything else: a base64-encoded URL

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use url::Url;

use crate::Error;

pub const KEY_SCHEME: &str = "key://";

/// A classified subscription reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionReference {
    /// Cache key, without the `key://` prefix.
    Cached(String),
    /// URL used as given.
    Direct(String),
    /// Base64 text still to be decoded.
    Encoded(String),
}

impl SubscriptionReference {
    /// Classify a raw reference string. Classification itself never fails.
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(key) = trimmed.strip_prefix(KEY_SCHEME) {
            Self::Cached(key.to_string())
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::Direct(trimmed.to_string())
        } else {
            Self::Encoded(trimmed.to_string())
        }
    }

    /// The URL to fetch for `Direct` and `Encoded` references.
    ///
    /// Returns `Ok(None)` for cache keys.
    ///
    /// # Errors
    ///
    /// Returns `Error::BadInput` if an encoded reference does not decode to
    /// an http(s) URL.
    pub fn remote_url(&self) -> Result<Option<String>, Error> {
        match self {
            Self::Cached(_) => Ok(None),
            Self::Direct(url) => Ok(Some(url.clone())),
            Self::Encoded(blob) => decode_url(blob).map(Some),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cached(_) => "cached",
            Self::Direct(_) => "direct",
            Self::Encoded(_) => "encoded",
        }
    }
}

/// Decode a base64 blob into an http(s) URL.
///
/// Accepts the standard and URL-safe alphabets, with or without padding.
/// Spaces are read as `+`, which form decoding of an unescaped query turns
/// into spaces.
///
/// # Errors
///
/// Returns `Error::BadInput` if the blob is not base64, not UTF-8, or not an
/// http(s) URL.
pub fn decode_url(blob: &str) -> Result<String, Error> {
    let unpadded = blob.trim().trim_end_matches('=').replace(' ', "+");
    if unpadded.is_empty() {
        return Err(Error::BadInput("empty subscription reference".into()));
    }

    let bytes = STANDARD_NO_PAD
        .decode(&unpadded)
        .or_else(|_| URL_SAFE_NO_PAD.decode(&unpadded))
        .map_err(|e| Error::BadInput(format!("base64 decode failed: {e}")))?;
    let text = String::from_utf8(bytes).map_err(|_| Error::BadInput("decoded reference is not UTF-8".into()))?;
    let text = text.trim().to_string();

    let parsed = Url::parse(&text).map_err(|e| Error::BadInput(format!("decoded reference is not a URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(text),
        scheme => Err(Error::BadInput(format!("unsupported scheme: {scheme}"))),
    }
}

/// Encode a URL the way callers are expected to.
pub fn encode_url(url: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(url.as_bytes())
}
