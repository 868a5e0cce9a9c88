// src/checker/http.rs
// =============================================================================
// This module fetches a single URL, retrying when the network fails.
//
// Key functionality:
// - Makes HTTP GET requests (the body may be needed for crawling)
// - Sends the configured headers, with per-domain overrides
// - Gives each attempt its own timeout
// - Retries transport failures (DNS, refused connection, timeout, TLS) with
//   a fixed pause between attempts
//
// Any HTTP status counts as an answer. A 404 or 500 comes back as Ok(response)
// straight away; deciding whether that's broken is the crawl engine's call.
//
// Rust concepts:
// - async/await: each attempt and each pause is a suspension point
// - Result<T, E>: Ok(response) or Err(FetchError) once attempts run out
// =============================================================================

use reqwest::{Client, Response};
use url::Url;

use crate::config::CrawlOptions;
use crate::error::FetchError;
use crate::events::{CrawlEvent, EventBus};

// Maximum redirects reqwest follows before giving up on a link
const MAX_REDIRECTS: usize = 10;

// Builds the HTTP client shared by every check in a crawl
//
// Timeouts are set per request (see fetch_with_retry), not here.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
}

// Fetches `url`, making up to `options.effective_retries()` attempts
//
// Parameters:
//   client: shared reqwest client
//   options: headers, timeout, retry count and delay
//   url: absolute URL to GET
//   parent_url: page the link was found on (only used in notifications)
//   events: where retry notifications go
//
// Returns: the first response any attempt produced, whatever its status
pub async fn fetch_with_retry(
    client: &Client,
    options: &CrawlOptions,
    url: &str,
    parent_url: Option<&str>,
    events: &EventBus,
) -> Result<Response, FetchError> {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let headers = options.headers_for(host.as_deref());

    let attempts = options.effective_retries();
    let mut last_error = None;

    for attempt in 1..=attempts {
        let request = client
            .get(url)
            .timeout(options.request_timeout())
            .headers(headers.clone());

        match request.send().await {
            Ok(response) => return Ok(response),
            Err(e) => {
                let message = describe_error(&e);

                if attempt < attempts {
                    tracing::warn!(url, attempt, error = %message, "fetch failed, retrying");
                    events.emit(CrawlEvent::Retry {
                        url: url.to_string(),
                        attempt,
                        error: message.clone(),
                        parent_url: parent_url.map(str::to_string),
                    });
                    tokio::time::sleep(options.retry_pause()).await;
                }

                last_error = Some(message);
            }
        }
    }

    Err(FetchError::RetriesExhausted {
        attempts,
        last_error,
    })
}

// Turns a reqwest error into a short human-readable message
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure
// - SSL certificate issues
// - Too many redirects
// - etc.
fn describe_error(error: &reqwest::Error) -> String {
    let error_string = error.to_string();

    if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", root_cause(error))
    } else if error_string.contains("certificate") || error_string.contains("ssl") {
        format!("SSL certificate error: {}", root_cause(error))
    } else {
        error_string
    }
}

// reqwest's own Display is just "error sending request for url (...)";
// the useful part (refused, dns, ...) is at the bottom of the source chain
fn root_cause(error: &reqwest::Error) -> String {
    let mut cause: &dyn std::error::Error = error;
    while let Some(next) = cause.source() {
        cause = next;
    }
    cause.to_string()
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why rebuild the request on every attempt?
//    - RequestBuilder::send() takes `self` by value
//    - Once sent, the builder is gone, so each retry starts from client.get()
//
// 2. Why is a 404 not retried?
//    - reqwest only returns Err for transport problems
//    - A 404 is a perfectly good answer from the server, so it's Ok(response)
//
// 3. What is tokio::time::sleep?
//    - Async sleep: other link checks keep running while this one waits
// -----------------------------------------------------------------------------
