//! Quoting of bare `short-id` values.
//!
//! Reality `short-id` values are hex strings. Left bare, a strict YAML
//! parser reads `0123` or `1e10` as numbers and the client rejects the
//! config. This works on text so it can run before and after parsing.

use std::sync::LazyLock;

use regex::{Captures, Regex};

// The delimiter after the value is checked by hand, not matched, so the next
// `short-id` in a flow mapping can still use it as its own prefix.
static BARE_SHORT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(^|[\s{,])(short-id:[ \t]*)([0-9a-fA-F]+)([ \t]*)").unwrap());

fn ends_value(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with([',', '}', '#', '\n']) || rest.starts_with("\r\n")
}

/// Quote every bare hexadecimal `short-id` value. Idempotent.
pub fn sanitize_short_ids(text: &str) -> String {
    BARE_SHORT_ID
        .replace_all(text, |caps: &Captures| {
            let end = caps.get(0).map_or(text.len(), |m| m.end());
            if ends_value(&text[end..]) {
                format!(r#"{}{}"{}"{}"#, &caps[1], &caps[2], &caps[3], &caps[4])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_bare_value() {
        assert_eq!(sanitize_short_ids("short-id: ab12cd"), r#"short-id: "ab12cd""#);
    }

    #[test]
    fn test_quoted_value_unchanged() {
        let text = r#"short-id: "ab12cd""#;
        assert_eq!(sanitize_short_ids(text), text);
        let single = "short-id: 'ab12cd'";
        assert_eq!(sanitize_short_ids(single), single);
    }

    #[test]
    fn test_idempotent() {
        let text = "proxies:\n  - name: a\n    reality-opts:\n      public-key: xyz\n      short-id: 0123\n  - {name: b, reality-opts: {short-id: 1e10, public-key: k}}\n";
        let once = sanitize_short_ids(text);
        assert_eq!(sanitize_short_ids(&once), once);
        assert!(once.contains(r#"short-id: "0123""#));
        assert!(once.contains(r#"{short-id: "1e10", public-key: k}"#));
    }

    #[test]
    fn test_adjacent_flow_entries_quoted_in_one_pass() {
        let once = sanitize_short_ids("{short-id: ab,short-id: cd}");
        assert_eq!(once, r#"{short-id: "ab",short-id: "cd"}"#);
        assert_eq!(sanitize_short_ids(&once), once);

        let spaced = sanitize_short_ids("{short-id: ab ,short-id: cd }");
        assert_eq!(spaced, r#"{short-id: "ab" ,short-id: "cd" }"#);
    }

    #[test]
    fn test_other_fields_untouched() {
        let text = "public-key: abcdef\nmy-short-id: abcd\nshort-id-extra: 12\n";
        assert_eq!(sanitize_short_ids(text), text);
    }

    #[test]
    fn test_partial_hex_token_untouched() {
        let text = "short-id: abc-def\nshort-id: 12zz\n";
        assert_eq!(sanitize_short_ids(text), text);
    }

    #[test]
    fn test_trailing_comment_and_crlf() {
        assert_eq!(sanitize_short_ids("short-id: ff # reality\r\n"), "short-id: \"ff\" # reality\r\n");
        assert_eq!(sanitize_short_ids("short-id: ff\r\nnext: 1\r\n"), "short-id: \"ff\"\r\nnext: 1\r\n");
    }

    #[test]
    fn test_empty_value_untouched() {
        let text = "short-id:\nshort-id: \"\"\n";
        assert_eq!(sanitize_short_ids(text), text);
    }
}
