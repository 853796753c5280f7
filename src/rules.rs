//! URL → status rules.
//!
//! A rule maps a URL pattern to a presence status. Patterns come in two
//! forms, decided once when the rule list is loaded:
//!   - a plain substring, tested case-sensitively against the full URL;
//!   - a delimited regular expression written `/body/flags` (flags: i m s x).
//!
//! Rules are evaluated in list order and the first match wins. A pattern
//! that fails to compile stays in the set as an inert entry that never
//! matches — a hand-edited config file must not be able to abort a scan.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One `(pattern, status)` mapping, as written in `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Substring or `/body/flags` regex, matched against the full URL.
    pub pattern: String,
    /// Presence status text published when the pattern matches.
    pub status: String,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            status: status.into(),
        }
    }
}

/// The rule list shipped on first run.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new("youtube.com", "Watching YouTube"),
        Rule::new("github.com", "Working on code"),
        Rule::new("netflix.com", "Watching Netflix"),
        Rule::new("docs.google.com", "Working on documents"),
        Rule::new("/prompt|ai|gpt|llm/i", "Learning AI and ML"),
    ]
}

// ─── Pattern compilation ──────────────────────────────────────────────────────

/// A pattern the control surface refused to save.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pattern `{pattern}`: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// How one pattern string is interpreted at match time.
#[derive(Debug, Clone)]
enum Matcher {
    Substring(String),
    Regex(Regex),
    /// Failed to compile — kept in the list, never matches.
    Inert,
}

/// Split `/body/flags` into its parts.
///
/// Mirrors the loose delimiting the config format allows: the pattern must
/// start with `/` and contain a later `/`; everything after the last `/` is
/// the flag string. A lone `/` is a substring pattern, not a regex.
fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    if !pattern.starts_with('/') {
        return None;
    }
    match pattern.rfind('/') {
        Some(last) if last > 0 => Some((&pattern[1..last], &pattern[last + 1..])),
        _ => None,
    }
}

fn compile_delimited(body: &str, flags: &str) -> Result<Regex, String> {
    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(format!("unsupported flag `{other}`")),
        };
    }
    builder.build().map_err(|e| e.to_string())
}

/// Validate every pattern in `rules`.
///
/// Called by the control surface before a rule list is persisted, so a bad
/// regex is rejected at save time instead of silently never matching.
pub fn validate(rules: &[Rule]) -> Result<(), PatternError> {
    for rule in rules {
        if let Some((body, flags)) = split_delimited(&rule.pattern) {
            if let Err(reason) = compile_delimited(body, flags) {
                return Err(PatternError {
                    pattern: rule.pattern.clone(),
                    reason,
                });
            }
        }
    }
    Ok(())
}

// ─── RuleSet ──────────────────────────────────────────────────────────────────

/// An ordered rule list with its patterns compiled.
///
/// Built once per configuration snapshot and never mutated during a match
/// pass — a config change produces a whole new `RuleSet`.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(Rule, Matcher)>,
}

impl RuleSet {
    /// Compile `rules`, keeping uncompilable patterns as inert entries.
    pub fn compile(rules: &[Rule]) -> Self {
        let compiled = rules
            .iter()
            .map(|rule| {
                let matcher = match split_delimited(&rule.pattern) {
                    Some((body, flags)) => match compile_delimited(body, flags) {
                        Ok(re) => Matcher::Regex(re),
                        Err(reason) => {
                            warn!(pattern = %rule.pattern, %reason, "pattern does not compile — rule will never match");
                            Matcher::Inert
                        }
                    },
                    None => Matcher::Substring(rule.pattern.clone()),
                };
                (rule.clone(), matcher)
            })
            .collect();
        Self { rules: compiled }
    }

    /// Return the first rule whose pattern matches `url`, or `None`.
    ///
    /// The URL is used verbatim — no normalization. An empty set returns
    /// `None`; there is no default status.
    pub fn matches(&self, url: &str) -> Option<&Rule> {
        self.rules.iter().find_map(|(rule, matcher)| {
            let hit = match matcher {
                Matcher::Substring(needle) => url.contains(needle.as_str()),
                Matcher::Regex(re) => re.is_match(url),
                Matcher::Inert => false,
            };
            hit.then_some(rule)
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules as configured, in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|(rule, _)| rule)
    }
}

/// One-shot convenience used by the CLI pattern tester.
pub fn pattern_matches(pattern: &str, url: &str) -> Result<bool, PatternError> {
    match split_delimited(pattern) {
        Some((body, flags)) => match compile_delimited(body, flags) {
            Ok(re) => Ok(re.is_match(url)),
            Err(reason) => Err(PatternError {
                pattern: pattern.to_string(),
                reason,
            }),
        },
        None => Ok(url.contains(pattern)),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn set(rules: &[(&str, &str)]) -> RuleSet {
        let rules: Vec<Rule> = rules.iter().map(|(p, s)| Rule::new(*p, *s)).collect();
        RuleSet::compile(&rules)
    }

    #[test]
    fn substring_is_case_sensitive() {
        let rules = set(&[("foo", "Foo time")]);
        assert!(rules.matches("https://foo.example").is_some());
        assert!(rules.matches("https://FOO.example").is_none());
    }

    #[test]
    fn delimited_regex_honors_i_flag() {
        let rules = set(&[("/foo/i", "Foo time")]);
        assert!(rules.matches("FOO").is_some());
        assert!(rules.matches("bar").is_none());
    }

    #[test]
    fn first_match_wins() {
        let rules = set(&[("example", "first"), ("example.com", "second")]);
        assert_eq!(rules.matches("https://example.com").unwrap().status, "first");
    }

    #[test]
    fn malformed_regex_is_inert_and_scan_continues() {
        let rules = set(&[("/[/", "broken"), ("example", "works")]);
        assert_eq!(rules.matches("https://example.com").unwrap().status, "works");
    }

    #[test]
    fn empty_set_matches_nothing() {
        assert!(RuleSet::default().matches("https://example.com").is_none());
    }

    #[test]
    fn lone_slash_is_a_substring_pattern() {
        let rules = set(&[("/", "any path")]);
        assert!(rules.matches("https://example.com/x").is_some());
    }

    #[test]
    fn url_is_used_verbatim() {
        // No normalization: a pattern on the raw scheme text matches too.
        let rules = set(&[("HTTPS://", "shouty scheme")]);
        assert!(rules.matches("https://example.com").is_none());
    }

    #[test]
    fn validate_rejects_bad_body_and_unknown_flag() {
        assert!(validate(&[Rule::new("/[/", "x")]).is_err());
        assert!(validate(&[Rule::new("/abc/q", "x")]).is_err());
        assert!(validate(&[Rule::new("/abc/im", "x")]).is_ok());
        assert!(validate(&[Rule::new("plain text", "x")]).is_ok());
    }

    #[test]
    fn default_rules_cover_the_shipped_mappings() {
        let rules = RuleSet::compile(&default_rules());
        assert_eq!(
            rules.matches("https://www.youtube.com/watch?v=x").unwrap().status,
            "Watching YouTube"
        );
        // `ai` appears case-insensitively in the host.
        assert_eq!(
            rules.matches("https://chat.openai.com/").unwrap().status,
            "Learning AI and ML"
        );
        assert!(rules.matches("https://example.com").is_none());
    }
}
