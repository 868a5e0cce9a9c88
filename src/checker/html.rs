// src/checker/html.rs
// =============================================================================
// This module extracts links from HTML pages.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// Every href goes through `classify::resolve_href`, so the result only ever holds
// absolute http/https URLs. Duplicates are kept: deduplication is the crawl
// engine's job, against its visited set.
// =============================================================================

use scraper::{Html, Selector};
use url::Url;

use super::classify::resolve_href;

// Extracts all links from HTML content
//
// Parameters:
//   html: the HTML content to parse
//   base_url: the URL the page was served from (after redirects), used to
//             resolve relative links
//
// Returns: absolute URLs in document order
//
// Example:
//   html = "<a href='/docs'>Docs</a>"
//   base_url = "https://example.com"
//   result = ["https://example.com/docs"]
pub fn extract_html_links(html: &str, base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(base_url, error = %e, "can't resolve links against invalid base URL");
            return Vec::new();
        }
    };

    // "a[href]" is a constant selector, it always parses
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    let links: Vec<String> = document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_href(&base, href))
        .collect();

    links
}
