//! Proxy list merging across subscription documents.
//!
//! Secondary `proxies` are appended to the primary in caller order. Nothing
//! is deduplicated, renamed or validated. A secondary that failed to resolve,
//! is not a mapping, or has no `proxies` sequence is skipped.

use serde_yaml::{Mapping, Value};

use super::outcome::{MergeReport, StageOutcome};
use super::{PROXIES, kind_of};
use crate::Error;

const STAGE: &str = "merge";

/// A secondary document as it arrived from the resolver.
#[derive(Debug)]
pub struct Secondary {
    /// Reference the document came from, for logs.
    pub source: String,
    pub document: Result<Value, Error>,
}

impl Secondary {
    pub fn new(source: impl Into<String>, document: Result<Value, Error>) -> Self {
        Self { source: source.into(), document }
    }

    fn skipped(source: &str, reason: String) -> StageOutcome {
        tracing::warn!(stage = STAGE, source = %source, %reason, "skipping secondary subscription");
        StageOutcome::Skipped { stage: STAGE, reason: format!("{source}: {reason}") }
    }
}

/// Make sure `primary.proxies` is a sequence and return it.
///
/// An absent or null field becomes an empty sequence.
///
/// # Errors
///
/// Returns `Error::MalformedDocument` if `proxies` holds some other value.
pub fn ensure_proxies(primary: &mut Mapping) -> Result<&mut Vec<Value>, Error> {
    let slot = primary.entry(Value::from(PROXIES)).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Sequence(Vec::new());
    }
    let kind = kind_of(slot);
    slot.as_sequence_mut()
        .ok_or_else(|| Error::MalformedDocument(format!("primary `proxies` is {kind}, expected a sequence")))
}

/// Append every secondary's proxies onto `primary`, in the order given.
///
/// # Errors
///
/// Fails only when the primary's own `proxies` field is unusable; secondary
/// problems are recorded in the report.
pub fn merge_proxies(
    primary: &mut Mapping, secondaries: impl IntoIterator<Item = Secondary>,
) -> Result<MergeReport, Error> {
    let proxies = ensure_proxies(primary)?;
    let mut report = MergeReport::default();

    for secondary in secondaries {
        let outcome = match secondary.document {
            Err(e) => Secondary::skipped(&secondary.source, e.to_string()),
            Ok(Value::Mapping(mut doc)) => match doc.remove(PROXIES) {
                Some(Value::Sequence(entries)) => {
                    let changed = entries.len();
                    proxies.extend(entries);
                    report.appended += changed;
                    tracing::debug!(stage = STAGE, source = %secondary.source, changed, "merged secondary proxies");
                    StageOutcome::Applied { stage: STAGE, changed }
                }
                Some(other) => {
                    Secondary::skipped(&secondary.source, format!("`proxies` is {}, expected a sequence", kind_of(&other)))
                }
                None => Secondary::skipped(&secondary.source, "no `proxies` field".into()),
            },
            Ok(other) => Secondary::skipped(&secondary.source, format!("document is {}, expected a mapping", kind_of(&other))),
        };
        report.sources.push(outcome);
    }

    Ok(report)
}
