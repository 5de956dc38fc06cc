//! Matching of incoming query text against declared patterns.

use std::fmt;

use educe::Educe;
use itertools::Itertools;
use regex::Regex;

use crate::UsageError;

/// How declared query patterns are compared with the text the program under test sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryMatcher {
    /// The pattern is a regular expression which must match somewhere in the text.
    #[default]
    Regex,
    /// The pattern is literal SQL which must equal the text once whitespace is normalized.
    Equal,
}

impl QueryMatcher {
    /// Compiles `pattern` under this strategy.
    ///
    /// Fails immediately on an invalid regular expression, so a bad pattern is reported
    /// where the expectation is declared.
    pub fn compile(self, pattern: &str) -> Result<Pattern, UsageError> {
        match self {
            QueryMatcher::Regex => Regex::new(pattern)
                .map(Pattern::Regex)
                .map_err(|source| UsageError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                }),
            QueryMatcher::Equal => Ok(Pattern::Exact(normalize_sql(pattern))),
        }
    }
}

/// A compiled query pattern.
#[derive(Debug, Clone, Educe)]
#[educe(PartialEq)]
pub enum Pattern {
    Regex(#[educe(PartialEq(method = "cmp_regex"))] Regex),
    Exact(String),
}

/// Regexes are equal when they came from the same text.
fn cmp_regex(l: &Regex, r: &Regex) -> bool {
    l.as_str() == r.as_str()
}

impl Pattern {
    /// Returns whether `sql` satisfies this pattern. A regex only needs a partial match.
    pub fn is_match(&self, sql: &str) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(sql),
            Pattern::Exact(expected) => *expected == normalize_sql(sql),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Regex(re) => re.as_str(),
            Pattern::Exact(sql) => sql,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

/// Returns whether `sql` satisfies an optional pattern. No pattern accepts any text.
pub(crate) fn matches(pattern: Option<&Pattern>, sql: &str) -> bool {
    pattern.map_or(true, |p| p.is_match(sql))
}

/// Trim and replace multiple whitespaces with one.
pub(crate) fn normalize_sql(s: &str) -> String {
    s.trim().split_ascii_whitespace().join(" ")
}
