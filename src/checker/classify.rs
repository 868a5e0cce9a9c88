// src/checker/classify.rs
// =============================================================================
// Turns raw hrefs into absolute URLs and decides which ones we crawl into.
//
// Two questions get answered here:
// 1. Is this href something we can check at all? (an http/https URL once
//    resolved against the page it was found on)
// 2. Should we also scan that page for more links? Only if it lives on the
//    same origin (scheme + host + port) as the page that linked to it.
//
// Rust concepts:
// - Url::join: resolves relative references the same way a browser does
// - Url::origin: scheme/host/port triple, comparable with ==
// =============================================================================

use url::Url;

// Resolves an href found on `base` to an absolute http(s) URL
//
// Returns None for:
//   - fragment-only hrefs ("#top")
//   - hrefs that can't be resolved ("http://[broken")
//   - anything that isn't http/https once resolved (mailto:, tel:, javascript:, ...)
//
// Examples:
//   base = "https://example.com/docs/page"
//   href = "/about"            -> Some("https://example.com/about")
//   href = "../img/a.png"      -> Some("https://example.com/img/a.png")
//   href = "https://other.com" -> Some("https://other.com/")
//   href = "#section"          -> None
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with('#') {
        return None;
    }

    let resolved = base.join(href).ok()?;
    if is_http_scheme(&resolved) {
        Some(resolved.into())
    } else {
        None
    }
}

/// Whether a link found on `page` should itself be crawled for more links.
///
/// Links that don't parse are never recursive.
pub fn is_same_origin(link: &str, page: &Url) -> bool {
    match Url::parse(link) {
        Ok(link) => link.origin() == page.origin(),
        Err(_) => false,
    }
}

pub fn is_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
