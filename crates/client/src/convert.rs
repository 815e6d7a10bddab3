//! Third-party conversion requests.
//!
//! The converter is a subconverter-compatible endpoint: it fetches the
//! subscription itself and answers with a clash config. Only `url` and
//! `config` vary per request; every other flag is fixed.

use url::Url;

use crate::fetch::conversion_endpoint;
use subrelay_core::Error;

/// Flags sent with every conversion request, in order.
pub const FIXED_PARAMS: &[(&str, &str)] = &[
    ("target", "clash"),
    ("emoji", "true"),
    ("udp", "true"),
    ("scv", "true"),
    ("list", "false"),
    ("tfo", "false"),
    ("xudp", "false"),
    ("fdn", "false"),
    ("sort", "false"),
    ("expand", "true"),
    ("new_name", "true"),
    ("append_type", "false"),
    ("insert", "false"),
];

/// A request to the conversion endpoint.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub endpoint: Url,
    /// Subscription URL the converter will fetch.
    pub subscription_url: String,
    /// Optional override config URL.
    pub config_url: Option<String>,
}

impl ConversionRequest {
    /// # Errors
    ///
    /// Returns `Error::BadInput` if `endpoint` is not an http(s) URL.
    pub fn new(endpoint: &str, subscription_url: impl Into<String>, config_url: Option<String>) -> Result<Self, Error> {
        let endpoint =
            conversion_endpoint(endpoint).map_err(|e| Error::BadInput(format!("conversion endpoint: {e}")))?;
        Ok(Self { endpoint, subscription_url: subscription_url.into(), config_url })
    }

    /// Full request URL with fixed flags, `url` and `config` appended.
    pub fn to_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for (name, value) in FIXED_PARAMS {
                query.append_pair(name, value);
            }
            query.append_pair("url", &self.subscription_url);
            if let Some(config) = &self.config_url {
                query.append_pair("config", config);
            }
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
    }

    #[test]
    fn test_fixed_params_then_url() {
        let req = ConversionRequest::new("http://127.0.0.1:25500", "https://a.example/sub?token=1&x=2", None).unwrap();
        let url = req.to_url();

        assert_eq!(url.path(), "/sub");
        let pairs = pairs(&url);
        assert_eq!(pairs[0], ("target".to_string(), "clash".to_string()));
        assert!(pairs.contains(&("emoji".to_string(), "true".to_string())));
        assert!(pairs.contains(&("udp".to_string(), "true".to_string())));
        assert!(pairs.contains(&("scv".to_string(), "true".to_string())));
        assert_eq!(pairs.last().unwrap(), &("url".to_string(), "https://a.example/sub?token=1&x=2".to_string()));
        assert!(!pairs.iter().any(|(k, _)| k == "config"));
    }

    #[test]
    fn test_config_appended_and_existing_query_kept() {
        let req = ConversionRequest::new(
            "https://conv.example/sub?api_key=abc",
            "https://a.example/sub",
            Some("https://cfg.example/rules.ini".into()),
        )
        .unwrap();
        let pairs = pairs(&req.to_url());

        assert_eq!(pairs[0], ("api_key".to_string(), "abc".to_string()));
        assert_eq!(pairs.last().unwrap(), &("config".to_string(), "https://cfg.example/rules.ini".to_string()));
    }

    #[test]
    fn test_bad_endpoint() {
        let result = ConversionRequest::new("ftp://conv.example", "https://a.example/sub", None);
        assert!(matches!(result, Err(Error::BadInput(_))));
    }
}
