//! Local branch filtering.
//!
//! The server's branch pattern support is unreliable, so queries never
//! mention branches and every fetched page is narrowed here instead.

use regex::Regex;

/// One configured branch pattern, classified once at configuration time.
#[derive(Debug, Clone)]
pub enum BranchPattern {
    /// No wildcard: plain string equality.
    Exact(String),
    /// Contains `*`: anchored regex with `*` as `.*`; the raw string also
    /// matches by equality.
    Wildcard { raw: String, regex: Regex },
}

impl BranchPattern {
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        if !pattern.contains('*') {
            return BranchPattern::Exact(pattern.to_string());
        }

        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        match Regex::new(&format!("^{body}$")) {
            Ok(regex) => BranchPattern::Wildcard {
                raw: pattern.to_string(),
                regex,
            },
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Unusable branch pattern, matching exactly");
                BranchPattern::Exact(pattern.to_string())
            }
        }
    }

    #[must_use]
    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchPattern::Exact(name) => name == branch,
            BranchPattern::Wildcard { raw, regex } => raw == branch || regex.is_match(branch),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            BranchPattern::Exact(name) => name,
            BranchPattern::Wildcard { raw, .. } => raw,
        }
    }
}

/// A set of branch patterns; a change is kept if any pattern matches.
///
/// An empty filter keeps everything.
#[derive(Debug, Clone, Default)]
pub struct BranchFilter {
    patterns: Vec<BranchPattern>,
}

impl BranchFilter {
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.as_ref().trim())
                .filter(|p| !p.is_empty())
                .map(BranchPattern::parse)
                .collect(),
        }
    }

    #[must_use]
    pub fn matches(&self, branch: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(branch))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[BranchPattern] {
        &self.patterns
    }
}
