//! Cover documents: selective overrides applied onto a primary config.
//!
//! A cover carries two optional sections:
//!
//! ```yaml
//! proxy-groups:          # replace same-named groups, append new ones
//!   - name: Fallback
//!     type: fallback
//!     use: [P1, "P.*"]   # provider names, exact or regex
//! dialers:               # route matching proxies through another proxy
//!   - name: US-1
//!     dialer-proxy: relay
//!   - name: "JP-.*"
//!     dialer-proxy: relay-jp
//! ```
//!
//! Each sub-step is independent. A sub-step that cannot run is skipped and
//! reported; the others still apply.

use std::collections::{HashMap, HashSet};

use serde_yaml::{Mapping, Value};

use super::matcher::NameMatcher;
use super::outcome::{CoverReport, StageOutcome};
use super::{DIALER_PROXY, DIALERS, NAME, PROXIES, PROXY_GROUPS, PROXY_PROVIDERS, USE, kind_of, name_of};

pub const STAGE_GROUPS: &str = "cover.groups";
pub const STAGE_DIALERS: &str = "cover.dialers";

/// Why a sub-step did not run.
enum StepError {
    /// The cover does not ask for this sub-step.
    Absent(&'static str),
    /// The sub-step was asked for but the documents do not allow it.
    Invalid(String),
}

fn outcome(stage: &'static str, result: Result<usize, StepError>) -> StageOutcome {
    match result {
        Ok(changed) => StageOutcome::Applied { stage, changed },
        Err(StepError::Absent(what)) => {
            tracing::debug!(stage, "cover has no {what}");
            StageOutcome::Skipped { stage, reason: format!("cover has no {what}") }
        }
        Err(StepError::Invalid(reason)) => {
            tracing::warn!(stage, %reason, "cover step skipped");
            StageOutcome::Skipped { stage, reason }
        }
    }
}

/// Apply `cover` onto `primary` in place.
///
/// The caller re-serializes `primary` afterwards, whatever the report says.
pub fn apply_cover(primary: &mut Mapping, cover: &Value) -> CoverReport {
    let steps = vec![
        outcome(STAGE_GROUPS, cover_groups(primary, cover)),
        outcome(STAGE_DIALERS, attach_dialers(primary, cover)),
    ];
    CoverReport { steps }
}

/// Overwrite-or-append cover groups, rewriting their `use` lists first.
fn cover_groups(primary: &mut Mapping, cover: &Value) -> Result<usize, StepError> {
    let cover_groups = match cover.get(PROXY_GROUPS) {
        None | Some(Value::Null) => return Err(StepError::Absent("proxy-groups")),
        Some(Value::Sequence(groups)) => groups,
        Some(other) => {
            return Err(StepError::Invalid(format!("cover `proxy-groups` is {}, expected a sequence", kind_of(other))));
        }
    };

    let providers = provider_names(primary);

    let groups = match primary.get_mut(PROXY_GROUPS) {
        Some(Value::Sequence(groups)) => groups,
        Some(other) => {
            return Err(StepError::Invalid(format!(
                "primary `proxy-groups` is {}, expected a sequence",
                kind_of(other)
            )));
        }
        None => return Err(StepError::Invalid("primary has no `proxy-groups`".into())),
    };

    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, group) in groups.iter().enumerate() {
        if let Some(name) = name_of(group) {
            index.entry(name.to_string()).or_insert(i);
        }
    }

    let mut changed = 0;
    for cover_group in cover_groups {
        let mut group = cover_group.clone();
        rewrite_use(&mut group, &providers);

        match name_of(&group).map(str::to_string) {
            Some(name) => match index.get(&name) {
                Some(&i) => {
                    tracing::debug!(group = %name, "replacing proxy group");
                    groups[i] = group;
                }
                None => {
                    tracing::debug!(group = %name, "appending proxy group");
                    index.insert(name, groups.len());
                    groups.push(group);
                }
            },
            None => groups.push(group),
        }
        changed += 1;
    }

    Ok(changed)
}

/// Provider names from the primary's `proxy-providers`, in declaration order.
fn provider_names(primary: &Mapping) -> Vec<String> {
    primary
        .get(PROXY_PROVIDERS)
        .and_then(Value::as_mapping)
        .map(|providers| providers.keys().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Resolve a group's `use` entries against provider names.
///
/// An entry equal to a provider name is kept; otherwise it is treated as a
/// regex and expands to every matching provider. The result is deduplicated
/// in first-seen order and only replaces `use` when it is non-empty. A list
/// holding anything but strings is left as written.
fn rewrite_use(group: &mut Value, providers: &[String]) {
    if providers.is_empty() {
        return;
    }
    let Some(Value::Sequence(entries)) = group.get(USE) else {
        return;
    };
    if entries.iter().any(|entry| !entry.is_string()) {
        tracing::warn!(
            stage = STAGE_GROUPS,
            group = name_of(group).unwrap_or_default(),
            "`use` has non-string entries, keeping it unchanged"
        );
        return;
    }

    let mut seen = HashSet::new();
    let mut resolved: Vec<Value> = Vec::new();
    let mut push = |name: &str| {
        if seen.insert(name.to_string()) {
            resolved.push(Value::from(name));
        }
    };

    for entry in entries.iter().filter_map(Value::as_str) {
        if providers.iter().any(|p| p == entry) {
            push(entry);
            continue;
        }
        let matcher = NameMatcher::new(entry);
        if !matcher.has_pattern() {
            tracing::warn!(stage = STAGE_GROUPS, pattern = entry, "`use` entry is neither a provider nor a valid regex");
            continue;
        }
        for provider in providers.iter().filter(|p| matcher.matches_pattern(p)) {
            push(provider.as_str());
        }
    }

    if resolved.is_empty() {
        tracing::debug!(group = name_of(group).unwrap_or_default(), "`use` rewrite matched nothing, keeping original");
        return;
    }
    if let Some(mapping) = group.as_mapping_mut() {
        mapping.insert(Value::from(USE), Value::Sequence(resolved));
    }
}

/// Dialer rules split into an exact-name table and ordered regex rules.
struct DialerRules {
    exact: HashMap<String, String>,
    patterns: Vec<(NameMatcher, String)>,
}

impl DialerRules {
    fn from_records(records: &[Value]) -> Self {
        let mut exact = HashMap::new();
        let mut patterns = Vec::new();

        for record in records {
            let name = name_of(record);
            let dialer = record.get(DIALER_PROXY).and_then(Value::as_str);
            let (Some(name), Some(dialer)) = (name, dialer) else {
                tracing::warn!(stage = STAGE_DIALERS, "dialer rule needs string `name` and `dialer-proxy`, skipping");
                continue;
            };
            exact.entry(name.to_string()).or_insert_with(|| dialer.to_string());
            let matcher = NameMatcher::new(name);
            if matcher.has_pattern() {
                patterns.push((matcher, dialer.to_string()));
            }
        }

        Self { exact, patterns }
    }

    /// Exact match first, then the first declared pattern that matches.
    fn lookup(&self, proxy: &str) -> Option<&str> {
        self.exact.get(proxy).map(String::as_str).or_else(|| {
            self.patterns
                .iter()
                .find(|(matcher, _)| matcher.matches_pattern(proxy))
                .map(|(_, dialer)| dialer.as_str())
        })
    }
}

/// Set `dialer-proxy` on every primary proxy matched by a cover dialer rule.
fn attach_dialers(primary: &mut Mapping, cover: &Value) -> Result<usize, StepError> {
    let records = match cover.get(DIALERS) {
        None | Some(Value::Null) => return Err(StepError::Absent("dialers")),
        Some(Value::Sequence(records)) => records,
        Some(other) => {
            return Err(StepError::Invalid(format!("cover `dialers` is {}, expected a sequence", kind_of(other))));
        }
    };
    let rules = DialerRules::from_records(records);

    let proxies = match primary.get_mut(PROXIES) {
        Some(Value::Sequence(proxies)) => proxies,
        _ => return Err(StepError::Invalid("primary has no `proxies` sequence".into())),
    };

    let mut changed = 0;
    for proxy in proxies.iter_mut() {
        let Some(mapping) = proxy.as_mapping_mut() else {
            continue;
        };
        let Some(name) = mapping.get(NAME).and_then(Value::as_str) else {
            continue;
        };
        let Some(dialer) = rules.lookup(name) else {
            continue;
        };
        let dialer = Value::from(dialer);
        mapping.insert(Value::from(DIALER_PROXY), dialer);
        changed += 1;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::{parse_mapping, parse_value};

    fn group_names(primary: &Mapping) -> Vec<String> {
        primary
            .get(PROXY_GROUPS)
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(name_of)
            .map(str::to_string)
            .collect()
    }

    fn group<'a>(primary: &'a Mapping, name: &str) -> &'a Value {
        primary
            .get(PROXY_GROUPS)
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .find(|g| name_of(g) == Some(name))
            .unwrap()
    }

    fn use_list(group: &Value) -> Vec<&str> {
        group.get(USE).and_then(Value::as_sequence).unwrap().iter().filter_map(Value::as_str).collect()
    }

    fn dialer_of<'a>(primary: &'a Mapping, proxy: &str) -> Option<&'a str> {
        primary
            .get(PROXIES)
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .find(|p| name_of(p) == Some(proxy))
            .and_then(|p| p.get(DIALER_PROXY))
            .and_then(Value::as_str)
    }

    const PRIMARY: &str = r#"
proxies:
  - {name: US-1, type: ss}
  - {name: US-2, type: ss}
  - {name: JP-1, type: vmess}
proxy-providers:
  P1: {type: http, url: "https://a"}
  P2: {type: http, url: "https://b"}
  Other: {type: http, url: "https://c"}
proxy-groups:
  - {name: Proxy, type: select, proxies: [US-1, JP-1]}
  - {name: Auto, type: url-test, use: [P1]}
  - {name: Streaming, type: select, proxies: [US-2]}
"#;

    #[test]
    fn test_matching_group_replaced_in_place() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value("proxy-groups:\n  - {name: Auto, type: fallback, proxies: [JP-1]}\n").unwrap();

        let report = apply_cover(&mut primary, &cover);

        assert_eq!(group_names(&primary), vec!["Proxy", "Auto", "Streaming"]);
        assert_eq!(group(&primary, "Auto").get("type").and_then(Value::as_str), Some("fallback"));
        assert_eq!(report.step(STAGE_GROUPS), Some(&StageOutcome::Applied { stage: STAGE_GROUPS, changed: 1 }));
    }

    #[test]
    fn test_new_groups_appended_in_cover_order() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value(
            "proxy-groups:\n  - {name: Fallback, type: fallback}\n  - {name: Proxy, type: select}\n  - {name: Games, type: select}\n",
        )
        .unwrap();

        apply_cover(&mut primary, &cover);

        assert_eq!(group_names(&primary), vec!["Proxy", "Auto", "Streaming", "Fallback", "Games"]);
    }

    #[test]
    fn test_use_rewrite_exact_then_regex_deduplicated() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value("proxy-groups:\n  - {name: Auto, type: url-test, use: [P1, \"P.*\"]}\n").unwrap();

        apply_cover(&mut primary, &cover);

        assert_eq!(use_list(group(&primary, "Auto")), vec!["P1", "P2"]);
    }

    #[test]
    fn test_use_rewrite_without_matches_keeps_original() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value("proxy-groups:\n  - {name: New, type: select, use: [\"Missing\", \"[bad\"]}\n").unwrap();

        apply_cover(&mut primary, &cover);

        assert_eq!(use_list(group(&primary, "New")), vec!["Missing", "[bad"]);
    }

    #[test]
    fn test_use_with_non_string_entries_left_unchanged() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value("proxy-groups:\n  - {name: Mixed, type: select, use: [\"P.*\", 7, {x: 1}]}\n").unwrap();

        apply_cover(&mut primary, &cover);

        let kept = group(&primary, "Mixed").get(USE).and_then(Value::as_sequence).unwrap();
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].as_str(), Some("P.*"));
        assert_eq!(kept[1].as_u64(), Some(7));
        assert!(kept[2].is_mapping());
    }

    #[test]
    fn test_use_rewrite_skipped_without_providers() {
        let mut primary = parse_mapping("proxies: []\nproxy-groups: []\n").unwrap();
        let cover = parse_value("proxy-groups:\n  - {name: G, type: select, use: [\"P.*\"]}\n").unwrap();

        apply_cover(&mut primary, &cover);

        assert_eq!(use_list(group(&primary, "G")), vec!["P.*"]);
    }

    #[test]
    fn test_groups_step_skipped_when_primary_groups_missing() {
        let mut primary = parse_mapping("proxies:\n  - {name: US-1}\n").unwrap();
        let cover = parse_value(
            "proxy-groups:\n  - {name: G}\ndialers:\n  - {name: US-1, dialer-proxy: relay}\n",
        )
        .unwrap();

        let report = apply_cover(&mut primary, &cover);

        assert!(!report.step(STAGE_GROUPS).unwrap().is_applied());
        assert!(primary.get(PROXY_GROUPS).is_none());
        assert_eq!(dialer_of(&primary, "US-1"), Some("relay"));
    }

    #[test]
    fn test_dialer_exact_beats_regex() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value(
            "dialers:\n  - {name: \"US-.*\", dialer-proxy: d2}\n  - {name: US-1, dialer-proxy: d1}\n",
        )
        .unwrap();

        apply_cover(&mut primary, &cover);

        assert_eq!(dialer_of(&primary, "US-1"), Some("d1"));
        assert_eq!(dialer_of(&primary, "US-2"), Some("d2"));
        assert_eq!(dialer_of(&primary, "JP-1"), None);
    }

    #[test]
    fn test_dialer_first_declared_regex_wins() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value(
            "dialers:\n  - {name: \"JP\", dialer-proxy: first}\n  - {name: \".*-1\", dialer-proxy: second}\n",
        )
        .unwrap();

        apply_cover(&mut primary, &cover);

        assert_eq!(dialer_of(&primary, "JP-1"), Some("first"));
        assert_eq!(dialer_of(&primary, "US-1"), Some("second"));
    }

    #[test]
    fn test_dialer_invalid_regex_still_matches_exactly() {
        let mut primary = parse_mapping("proxies:\n  - {name: \"HK[01\"}\n  - {name: HK0}\n").unwrap();
        let cover = parse_value(
            "dialers:\n  - {name: \"HK[01\", dialer-proxy: relay}\n  - {name: 42}\n  - {name: HK0}\n",
        )
        .unwrap();

        let report = apply_cover(&mut primary, &cover);

        assert_eq!(dialer_of(&primary, "HK[01"), Some("relay"));
        assert_eq!(dialer_of(&primary, "HK0"), None);
        assert_eq!(report.step(STAGE_DIALERS), Some(&StageOutcome::Applied { stage: STAGE_DIALERS, changed: 1 }));
    }

    #[test]
    fn test_dialer_rule_applies_to_its_own_target() {
        let mut primary = parse_mapping("proxies:\n  - {name: relay}\n  - {name: US-1}\n").unwrap();
        let cover = parse_value("dialers:\n  - {name: \".*\", dialer-proxy: relay}\n").unwrap();

        let report = apply_cover(&mut primary, &cover);

        assert_eq!(dialer_of(&primary, "relay"), Some("relay"));
        assert_eq!(dialer_of(&primary, "US-1"), Some("relay"));
        assert_eq!(report.step(STAGE_DIALERS), Some(&StageOutcome::Applied { stage: STAGE_DIALERS, changed: 2 }));
    }

    #[test]
    fn test_invalid_sections_are_skipped_independently() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let cover = parse_value("proxy-groups: oops\ndialers:\n  - {name: JP-1, dialer-proxy: relay}\n").unwrap();

        let report = apply_cover(&mut primary, &cover);

        assert!(matches!(report.step(STAGE_GROUPS), Some(StageOutcome::Skipped { .. })));
        assert!(report.step(STAGE_DIALERS).unwrap().is_applied());
        assert_eq!(group_names(&primary), vec!["Proxy", "Auto", "Streaming"]);
        assert_eq!(dialer_of(&primary, "JP-1"), Some("relay"));
    }

    #[test]
    fn test_empty_cover_changes_nothing() {
        let mut primary = parse_mapping(PRIMARY).unwrap();
        let before = primary.clone();

        let report = apply_cover(&mut primary, &parse_value("{}").unwrap());

        assert_eq!(primary, before);
        assert!(report.steps.iter().all(|s| !s.is_applied()));
    }
}
