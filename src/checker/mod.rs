// src/checker/mod.rs
// =============================================================================
// The building blocks the crawl engine drives for each link.
//
// Submodules:
// - classify: resolves hrefs and decides same-origin recursion
// - ignore: the ignoreLinks regex filter
// - http: GET with per-domain headers, timeout and retries
// - html: pulls <a href> links out of a page
// =============================================================================

mod classify;
mod html;
mod http;
mod ignore;

pub use classify::{is_http_scheme, is_same_origin, resolve_href};
pub use html::extract_html_links;
pub use http::{build_client, fetch_with_retry};
pub use ignore::IgnoreFilter;
