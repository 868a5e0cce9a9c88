// src/error.rs
// =============================================================================
// Error types for the library side of link-patrol.
//
// Three families, matching where things can go wrong:
// - ConfigError: the options file can't be read, parsed or validated
// - CrawlError: a crawl can't start (bad seed, already running, ...)
// - FetchError: a single link's fetch failed on every attempt
//
// Only ConfigError and CrawlError ever leave `Crawler::run`. A FetchError is
// turned into a broken-link record and the crawl keeps going.
//
// The binary (src/main.rs) still uses anyhow on top of these, the same way
// the rest of the CLI does.
// =============================================================================

use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce a usable `CrawlOptions`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that abort a crawl before it starts.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("a crawl is already running on this crawler")]
    AlreadyRunning,

    #[error("invalid seed URL '{url}': {reason}")]
    InvalidSeedUrl { url: String, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A fetch that never produced a response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request failed after {attempts} attempt(s): {}", .last_error.as_deref().unwrap_or("no attempt recorded an error"))]
    RetriesExhausted {
        attempts: u32,
        last_error: Option<String>,
    },
}
