//! Glob patterns over keys and string values.
//!
//! `*` matches any run of characters (including none) and `?` matches
//! exactly one, newlines included; every other character is literal.
//! Patterns compile to anchored regular expressions, with fast paths for
//! `*`, literals and plain `prefix*` patterns.

use crate::error::StoreResult;
use regex::Regex;

/// Translates a glob into an anchored regular expression.
#[must_use]
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 12);
    out.push_str("(?s)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out.push('$');
    out
}

/// A compiled glob.
#[derive(Debug, Clone)]
pub enum GlobPattern {
    /// Matches everything.
    Any,
    /// Matches one exact string.
    Exact(String),
    /// Matches strings starting with the prefix.
    Prefix(String),
    /// General pattern.
    Regex(Regex),
}

impl GlobPattern {
    /// Compiles `pattern`.
    pub fn new(pattern: &str) -> StoreResult<Self> {
        if pattern.chars().all(|c| c == '*') && !pattern.is_empty() {
            return Ok(Self::Any);
        }
        let wildcards = pattern.matches(['*', '?']).count();
        if wildcards == 0 {
            return Ok(Self::Exact(pattern.to_string()));
        }
        if wildcards == 1 && pattern.ends_with('*') {
            return Ok(Self::Prefix(pattern[..pattern.len() - 1].to_string()));
        }
        Ok(Self::Regex(Regex::new(&glob_to_regex(pattern))?))
    }

    /// Returns true if `pattern` contains a wildcard.
    #[must_use]
    pub fn has_wildcards(pattern: &str) -> bool {
        pattern.contains(['*', '?'])
    }

    /// Tests `candidate` against the pattern.
    pub fn is_match(&self, candidate: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(s) => candidate == s,
            Self::Prefix(p) => candidate.starts_with(p.as_str()),
            Self::Regex(re) => re.is_match(candidate),
        }
    }
}
