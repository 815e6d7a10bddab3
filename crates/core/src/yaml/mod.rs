//! YAML document handling for subscription configs.
//!
//! Documents are kept as `serde_yaml` trees. `serde_yaml::Mapping` preserves
//! insertion order, so `proxies` stays ahead of `proxy-groups` after a
//! parse/mutate/serialize cycle.

pub mod cover;
pub mod matcher;
pub mod merge;
pub mod outcome;
pub mod short_id;

use serde_yaml::{Mapping, Value};

use crate::Error;

pub use cover::apply_cover;
pub use matcher::NameMatcher;
pub use merge::{Secondary, merge_proxies};
pub use outcome::{CoverReport, MergeReport, StageOutcome};
pub use short_id::sanitize_short_ids;

pub const PROXIES: &str = "proxies";
pub const PROXY_GROUPS: &str = "proxy-groups";
pub const PROXY_PROVIDERS: &str = "proxy-providers";
pub const DIALERS: &str = "dialers";
pub const DIALER_PROXY: &str = "dialer-proxy";
pub const NAME: &str = "name";
pub const USE: &str = "use";

/// Parse any YAML value.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the text is not valid YAML.
pub fn parse_value(text: &str) -> Result<Value, Error> {
    serde_yaml::from_str(text).map_err(|e| Error::MalformedDocument(format!("invalid YAML: {e}")))
}

/// Parse a document that must be a top-level mapping.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if the text is not YAML or its root
/// is not a mapping.
pub fn parse_mapping(text: &str) -> Result<Mapping, Error> {
    match parse_value(text)? {
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(Error::MalformedDocument(format!("expected a mapping at the root, found {}", kind_of(&other)))),
    }
}

/// Serialize a document back to text.
pub fn to_text(document: &Mapping) -> Result<String, Error> {
    serde_yaml::to_string(document).map_err(Error::from)
}

/// The string `name` field of a record, if it has one.
pub fn name_of(record: &Value) -> Option<&str> {
    record.get(NAME).and_then(Value::as_str)
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
