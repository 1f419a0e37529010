//! Wildcard and content pattern matching with a compiled-regex cache.
//!
//! The cache is keyed by the regex source string. A reload builds a fresh
//! matcher, so stale compiled patterns never outlive the topology they were
//! declared in. Patterns that fail to compile never match and are not
//! retried into the cache on every call (the failure is logged once per
//! evaluation at debug level only).

use dashmap::DashMap;
use regex::Regex;

/// Pattern matcher shared by the resolver and the blacklist filter.
#[derive(Default)]
pub struct PatternMatcher {
    cache: DashMap<String, Regex>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// True when `value` matches any pattern in the list. An empty list
    /// matches everything. Per pattern: `"*"` matches all, exact equality
    /// matches, patterns containing `*` are glob-matched, and anything else
    /// matches by substring containment.
    pub fn matches_any(&self, value: &str, patterns: &[String]) -> bool {
        if patterns.is_empty() {
            return true;
        }
        patterns.iter().any(|p| {
            if p == "*" || p == value {
                true
            } else if p.contains('*') {
                self.matches_wildcard(value, p)
            } else {
                value.contains(p.as_str())
            }
        })
    }

    /// Strict wildcard matching: `"*"` matches anything, patterns with `*`
    /// become anchored regexes (`*` → `.*`, everything else literal), and
    /// plain patterns compare exactly.
    pub fn matches_wildcard(&self, value: &str, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if pattern.contains('*') {
            let source = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
            return self
                .compiled(&source)
                .map(|re| re.is_match(value))
                .unwrap_or(false);
        }
        value == pattern
    }

    /// Wildcard matching over a pattern list; an empty list matches nothing
    /// (callers treat an empty predicate as match-all before getting here).
    pub fn matches_any_wildcard(&self, value: &str, patterns: &[String]) -> bool {
        patterns.iter().any(|p| self.matches_wildcard(value, p))
    }

    /// Content matching: patterns starting with `^` or `.*` are raw regexes;
    /// everything else is a case-insensitive substring test. Empty content
    /// matches nothing.
    pub fn matches_content(&self, content: &str, patterns: &[String]) -> bool {
        if content.is_empty() {
            return false;
        }
        patterns.iter().any(|p| {
            if p.starts_with('^') || p.starts_with(".*") {
                self.compiled(p).map(|re| re.is_match(content)).unwrap_or(false)
            } else {
                content.to_lowercase().contains(&p.to_lowercase())
            }
        })
    }

    /// Drop every compiled pattern. Correctness over cache retention.
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn compiled(&self, source: &str) -> Option<Regex> {
        if let Some(re) = self.cache.get(source) {
            return Some(re.clone());
        }
        match Regex::new(source) {
            Ok(re) => {
                self.cache.insert(source.to_string(), re.clone());
                Some(re)
            }
            Err(e) => {
                tracing::debug!(pattern = %source, error = %e, "pattern failed to compile");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pats(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_pattern_set_matches_all() {
        let m = PatternMatcher::new();
        assert!(m.matches_any("anything", &[]));
    }

    #[test]
    fn wildcard_semantics() {
        let m = PatternMatcher::new();
        assert!(m.matches_wildcard("mc1", "*"));
        assert!(m.matches_wildcard("mc1", "mc1"));
        assert!(!m.matches_wildcard("mc1", "mc2"));
        assert!(m.matches_wildcard("mc_survival", "mc_*"));
        assert!(!m.matches_wildcard("qq_bot", "mc_*"));
        // '*' expands greedily but stays anchored
        assert!(!m.matches_wildcard("prefix_mc_survival", "mc_*"));
        // regex metacharacters in the literal part are escaped
        assert!(m.matches_wildcard("a.b-1", "a.b-*"));
        assert!(!m.matches_wildcard("aXb-1", "a.b-*"));
    }

    #[test]
    fn matches_any_mixes_exact_glob_and_substring() {
        let m = PatternMatcher::new();
        assert!(m.matches_any("survival", &pats(&["creative", "survival"])));
        assert!(m.matches_any("mc_lobby", &pats(&["mc_*"])));
        assert!(m.matches_any("mc1", &pats(&["mc"]))); // substring
        assert!(!m.matches_any("qq_bot", &pats(&["mc_*", "creative"])));
    }

    #[test]
    fn content_substring_is_case_insensitive() {
        let m = PatternMatcher::new();
        assert!(m.matches_content("Server is STOPPING now", &pats(&["stopping"])));
        assert!(!m.matches_content("all good", &pats(&["stopping"])));
        assert!(!m.matches_content("", &pats(&["stopping"])));
    }

    #[test]
    fn content_regex_prefix_is_raw() {
        let m = PatternMatcher::new();
        assert!(m.matches_content("!!admin help", &pats(&["^!!"])));
        assert!(m.matches_content("xx admin yy", &pats(&[".*admin.*"])));
        assert!(!m.matches_content("admin", &pats(&["^!!"])));
    }

    #[test]
    fn bad_regex_never_matches() {
        let m = PatternMatcher::new();
        assert!(!m.matches_content("anything", &pats(&["^(unclosed"])));
    }

    #[test]
    fn cache_is_reused_and_clearable() {
        let m = PatternMatcher::new();
        assert!(m.matches_wildcard("mc1", "mc*"));
        assert_eq!(m.cache.len(), 1);
        assert!(m.matches_wildcard("mc2", "mc*"));
        assert_eq!(m.cache.len(), 1);
        m.clear();
        assert!(m.cache.is_empty());
    }
}
