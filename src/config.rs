// src/config.rs
// =============================================================================
// Crawl options and the JSON config-file loader.
//
// A config file is optional. Every key has a default, so an empty object `{}`
// (or no file at all) gives a working setup:
//
//   {
//     "ignoreLinks": ["\\.pdf$", "^https://twitter\\.com/"],
//     "headers": { "User-Agent": "link-patrol" },
//     "concurrency": 5,
//     "timeout": 3000,
//     "retries": 3,
//     "retryDelay": 1000,
//     "domainSpecificConfig": {
//       "api.example.com": { "headers": { "Authorization": "Bearer ..." } }
//     }
//   }
//
// `timeout` and `retryDelay` are milliseconds. `rateLimit` (top-level and per
// domain) is accepted for compatibility but nothing reads it yet.
// =============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Options for one `Crawler`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CrawlOptions {
    /// Regex sources; a URL matching any of them is never checked
    #[serde(default)]
    pub ignore_links: Vec<String>,

    /// Headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Maximum number of in-flight link checks
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-attempt request timeout, in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Attempts per link (values below 1 behave as 1)
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause between attempts, in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Per-hostname overrides
    #[serde(default)]
    pub domain_specific_config: HashMap<String, DomainConfig>,

    /// Reserved, not enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u64>,
}

/// Overrides applied when a request targets a given hostname.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DomainConfig {
    /// Merged over the global headers, winning on conflicts
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Reserved, not enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u64>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            ignore_links: Vec::new(),
            headers: HashMap::new(),
            concurrency: default_concurrency(),
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            domain_specific_config: HashMap::new(),
            rate_limit: None,
        }
    }
}

fn default_concurrency() -> usize {
    5
}

fn default_timeout() -> u64 {
    3000
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl CrawlOptions {
    /// Checks the values serde can't: ranges, regexes and header syntax.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency < 1 {
            return Err(ConfigError::Invalid(
                "concurrency must be at least 1".to_string(),
            ));
        }

        for pattern in &self.ignore_links {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("ignoreLinks pattern '{pattern}': {e}"))
            })?;
        }

        validate_headers(&self.headers, "headers")?;
        for (host, domain) in &self.domain_specific_config {
            validate_headers(
                &domain.headers,
                &format!("domainSpecificConfig.{host}.headers"),
            )?;
        }

        Ok(())
    }

    pub fn effective_retries(&self) -> u32 {
        self.retries.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    /// Global headers with the per-domain ones for `host` layered on top.
    ///
    /// Header names are case-insensitive, so a domain `x-token` replaces a
    /// global `X-Token`. Entries that aren't valid HTTP headers are skipped;
    /// `validate` rejects them up front.
    pub fn headers_for(&self, host: Option<&str>) -> HeaderMap {
        let mut merged = HeaderMap::new();
        insert_headers(&mut merged, &self.headers);
        if let Some(domain) = host.and_then(|h| self.domain_specific_config.get(h)) {
            insert_headers(&mut merged, &domain.headers);
        }
        merged
    }
}

fn insert_headers(map: &mut HeaderMap, headers: &HashMap<String, String>) {
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid header"),
        }
    }
}

fn validate_headers(headers: &HashMap<String, String>, field: &str) -> Result<(), ConfigError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ConfigError::Invalid(format!("{field}: bad header name '{name}'")))?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Invalid(format!("{field}: bad value for header '{name}'"))
        })?;
    }
    Ok(())
}

/// Loads and validates options from `path`, or returns the defaults when
/// no path is given.
pub fn load_options(path: Option<&Path>) -> Result<CrawlOptions, ConfigError> {
    let Some(path) = path else {
        return Ok(CrawlOptions::default());
    };

    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let options: CrawlOptions =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    options.validate()?;
    tracing::debug!(?path, "loaded crawl options");
    Ok(options)
}
