// src/crawl/types.rs
// =============================================================================
// Data the crawl engine moves around: queued links, the visited set, broken
// links and the final report.
// =============================================================================

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

// A link waiting to be checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub url: String,
    /// Page the link was found on (None for the seed)
    pub parent_url: Option<String>,
    /// Whether the page body gets scanned for more links
    pub is_recursive: bool,
}

impl QueueItem {
    pub fn seed(url: String) -> Self {
        Self {
            url,
            parent_url: None,
            is_recursive: true,
        }
    }
}

/// A link whose check ended in failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    pub url: String,
    /// "Status code: <n>" or "Error: <message>"
    pub reason: String,
    pub parent_url: Option<String>,
}

/// Everything a crawl found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    /// Every URL that was claimed for checking, in dispatch order
    pub links_visited: Vec<String>,
    pub broken_links: Vec<BrokenLink>,
}

impl CrawlReport {
    pub fn has_broken_links(&self) -> bool {
        !self.broken_links.is_empty()
    }
}

// URLs claimed for checking
//
// Insert-only: a URL goes in once and stays for the whole run. The Vec keeps
// dispatch order for the report; the HashSet makes lookups O(1).
#[derive(Debug, Default)]
pub(crate) struct VisitedSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl VisitedSet {
    /// Returns false if the URL was already there.
    pub fn insert(&mut self, url: &str) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.order.push(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.order
    }
}
