// src/lib.rs
// =============================================================================
// link-patrol: crawl a website and report every broken link, together with
// the page that links to it.
//
//   let crawler = Crawler::new(load_options(None)?)?;
//   let report = crawler.run("https://example.com").await?;
//   for broken in &report.broken_links { ... }
//
// Modules:
// - crawl: the crawl engine (queue, concurrency, visited set)
// - checker: per-link helpers (URL resolution, ignore filter, HTTP, HTML)
// - events: notifications emitted while crawling
// - config: options and the JSON config loader
// - error: error types
// =============================================================================

pub mod checker;
pub mod config;
pub mod crawl;
pub mod error;
pub mod events;

pub use config::{load_options, CrawlOptions, DomainConfig};
pub use crawl::{BrokenLink, CrawlReport, Crawler, QueueItem};
pub use error::{ConfigError, CrawlError, FetchError};
pub use events::{CrawlEvent, EventBus, EventKind};
