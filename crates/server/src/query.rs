//! Query string parsing with repeated keys.
//!
//! axum's `Query` extractor keeps only one value per key, so routes read
//! the raw query and collect values themselves.

use subrelay_core::Error;

/// Decoded query pairs, in request order.
#[derive(Debug, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs = raw
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self { pairs }
    }

    /// First non-empty value for `name`.
    pub fn first(&self, name: &str) -> Option<String> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// First non-empty value for `name`, or `BadInput`.
    pub fn required(&self, name: &str) -> Result<String, Error> {
        self.first(name).ok_or_else(|| Error::BadInput(format!("missing `{name}` parameter")))
    }

    /// Every value for `name`; each value may itself be a `|`-separated list.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(key, _)| key == name)
            .flat_map(|(_, value)| value.split('|'))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }
}
