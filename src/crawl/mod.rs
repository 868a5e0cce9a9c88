// src/crawl/mod.rs
// =============================================================================
// This module handles website crawling.
//
// Features:
// - Breadth-first crawling starting from a seed URL
// - Only same-origin HTML pages are scanned for more links; everything else
//   is just checked
// - Bounded number of checks in flight
// - Stoppable from another task
// =============================================================================

mod engine;
mod types;

pub use engine::Crawler;
pub use types::{BrokenLink, CrawlReport, QueueItem};
