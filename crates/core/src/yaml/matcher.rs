//! Exact-or-pattern name matching used by group and dialer rules.

use regex::Regex;

/// A name that matches exactly and, when it compiles, as a regex.
///
/// A pattern that fails to compile only loses its regex half.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    literal: String,
    pattern: Option<Regex>,
}

impl NameMatcher {
    pub fn new(literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let pattern = match Regex::new(&literal) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::debug!(pattern = %literal, error = %e, "name pattern is not a valid regex");
                None
            }
        };
        Self { literal, pattern }
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn has_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn is_exact(&self, name: &str) -> bool {
        self.literal == name
    }

    /// Regex match anywhere in `name`; false when the pattern did not compile.
    pub fn matches_pattern(&self, name: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(name))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.is_exact(name) || self.matches_pattern(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_pattern() {
        let m = NameMatcher::new("US-.*");
        assert!(m.has_pattern());
        assert!(m.is_exact("US-.*"));
        assert!(m.matches_pattern("US-1"));
        assert!(!m.matches_pattern("JP-1"));
    }

    #[test]
    fn test_invalid_regex_keeps_exact() {
        let m = NameMatcher::new("HK[01");
        assert!(!m.has_pattern());
        assert!(m.matches("HK[01"));
        assert!(!m.matches_pattern("HK0"));
    }

    #[test]
    fn test_pattern_is_unanchored() {
        let m = NameMatcher::new("HK");
        assert!(m.matches_pattern("Airport-HK-01"));
    }
}
