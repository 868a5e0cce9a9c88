// src/checker/ignore.rs
// =============================================================================
// The `ignoreLinks` filter.
//
// Each pattern is a regular expression searched anywhere in the URL (not
// anchored), so "\.pdf$" skips every PDF and "twitter\.com" skips every
// tweet. A URL that matches is never checked and never counted as visited.
// =============================================================================

use regex::Regex;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<Regex>,
}

impl IgnoreFilter {
    /// Compiles the patterns, keeping their order.
    pub fn new<S: AsRef<str>>(sources: &[S]) -> Result<Self, ConfigError> {
        let patterns = sources
            .iter()
            .map(|src| {
                let src = src.as_ref();
                Regex::new(src).map_err(|e| {
                    ConfigError::Invalid(format!("ignoreLinks pattern '{src}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_ignored(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }
}
