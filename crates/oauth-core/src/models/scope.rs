//! Space-delimited OAuth scope sets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered, duplicate-free set of scope strings.
///
/// Order of first appearance is preserved so `"read write"` round-trips
/// unchanged through a grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scopes(Vec<String>);

impl Scopes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-delimited scope string. Extra whitespace and repeats are dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.split_whitespace().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|s| s == scope)
    }

    /// Every scope in `self` is also in `allowed`.
    #[must_use]
    pub fn is_subset_of(&self, allowed: &Self) -> bool {
        self.0.iter().all(|s| allowed.contains(s))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl<S: Into<String>> FromIterator<S> for Scopes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut out: Vec<String> = Vec::new();
        for scope in iter {
            let scope = scope.into();
            if !scope.is_empty() && !out.contains(&scope) {
                out.push(scope);
            }
        }
        Self(out)
    }
}
