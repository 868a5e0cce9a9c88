// src/crawl/engine.rs
// =============================================================================
// The crawl engine.
//
// How it works:
// 1. Start with the seed URL in a queue
// 2. Take links off the queue and start checking them, keeping at most
//    `concurrency` checks in flight
// 3. When a check finishes, record a broken link if it failed, and queue the
//    links found on the page (only for same-origin HTML pages)
// 4. Repeat until the queue is empty and nothing is in flight
//
// Every check runs inside the `run` future (a FuturesUnordered, no spawned
// tasks), so the queue, visited set and broken list are plain locals that
// only change between awaits. A URL is marked visited when it's taken off the
// queue, before its check starts, so two pages linking to the same URL can't
// both get it checked.
//
// Rust concepts:
// - FuturesUnordered: a set of futures that yields whichever finishes first
// - VecDeque: FIFO queue for breadth-first order
// - Arc<AtomicBool>: lets stop() reach a run that's in progress
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use url::Url;

use super::types::{BrokenLink, CrawlReport, QueueItem, VisitedSet};
use crate::checker::{
    build_client, extract_html_links, fetch_with_retry, is_http_scheme, is_same_origin,
    IgnoreFilter,
};
use crate::config::CrawlOptions;
use crate::error::CrawlError;
use crate::events::{CrawlEvent, EventBus};

/// Recursive link checker for one site.
///
/// A `Crawler` runs one crawl at a time. Share it behind an `Arc` to call
/// [`Crawler::stop`] from another task while [`Crawler::run`] is in progress.
#[derive(Debug)]
pub struct Crawler {
    options: CrawlOptions,
    ignore: IgnoreFilter,
    client: Client,
    events: EventBus,
    run_state: Mutex<RunState>,
}

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    // Stop signal of the current run
    stop: Option<Arc<AtomicBool>>,
}

// Mutable state of one run, owned by the dispatch loop
#[derive(Default)]
struct CrawlState {
    queue: VecDeque<QueueItem>,
    visited: VisitedSet,
    broken: Vec<BrokenLink>,
}

// What a finished check hands back to the dispatch loop
struct CheckOutcome {
    broken: Option<BrokenLink>,
    discovered: Vec<QueueItem>,
}

impl CheckOutcome {
    fn ok() -> Self {
        Self {
            broken: None,
            discovered: Vec::new(),
        }
    }

    fn broken(item: &QueueItem, reason: String) -> Self {
        Self {
            broken: Some(BrokenLink {
                url: item.url.clone(),
                reason,
                parent_url: item.parent_url.clone(),
            }),
            discovered: Vec::new(),
        }
    }
}

impl Crawler {
    pub fn new(options: CrawlOptions) -> Result<Self, CrawlError> {
        options.validate()?;
        let ignore = IgnoreFilter::new(&options.ignore_links)?;
        let client = build_client()?;

        Ok(Self {
            options,
            ignore,
            client,
            events: EventBus::new(),
            run_state: Mutex::new(RunState::default()),
        })
    }

    /// Subscribe here before calling `run`.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    pub fn is_running(&self) -> bool {
        self.run_state().running
    }

    /// Crawls from `seed_url` until every reachable link has been checked.
    ///
    /// Fails only if the seed is not an http(s) URL or a crawl is already
    /// running. Broken links are part of the report, not errors. A run ended
    /// by [`Crawler::stop`] returns what it found so far without emitting
    /// `Complete`.
    pub async fn run(&self, seed_url: &str) -> Result<CrawlReport, CrawlError> {
        let seed = parse_seed(seed_url)?;
        let stop = self.begin_run()?;
        let _guard = RunGuard {
            crawler: self,
            stop: Arc::clone(&stop),
        };

        tracing::info!(seed = %seed, concurrency = self.options.concurrency, "crawl started");
        self.events.emit(CrawlEvent::Start {
            seed_url: seed.clone(),
        });

        let mut state = CrawlState::default();
        state.queue.push_back(QueueItem::seed(seed));

        let mut active = FuturesUnordered::new();

        loop {
            if stop.load(Ordering::SeqCst) {
                state.queue.clear();
            } else {
                while active.len() < self.options.concurrency {
                    let Some(item) = state.queue.pop_front() else {
                        break;
                    };

                    if state.visited.contains(&item.url) || self.ignore.is_ignored(&item.url) {
                        continue;
                    }

                    // Claim before checking, see module docs
                    state.visited.insert(&item.url);
                    tracing::debug!(url = %item.url, in_flight = active.len() + 1, "dispatch");
                    active.push(self.check_link(item));
                }
            }

            // None once nothing is in flight; the queue is empty by then
            // (drained above, or cleared by stop)
            let Some(outcome) = active.next().await else {
                break;
            };

            let stopped = stop.load(Ordering::SeqCst);
            self.apply_outcome(&mut state, outcome, stopped);
        }

        let report = CrawlReport {
            links_visited: state.visited.into_urls(),
            broken_links: state.broken,
        };

        if stop.load(Ordering::SeqCst) {
            tracing::info!(checked = report.links_visited.len(), "crawl stopped early");
            return Ok(report);
        }

        tracing::info!(
            checked = report.links_visited.len(),
            broken = report.broken_links.len(),
            "crawl complete"
        );
        self.events.emit(CrawlEvent::Complete(report.clone()));
        Ok(report)
    }

    /// Stops the current run, if any.
    ///
    /// Queued links are dropped. Checks already in flight finish, but the
    /// links they find are not followed.
    pub fn stop(&self) {
        {
            let mut state = self.run_state();
            if !state.running {
                return;
            }
            state.running = false;
            if let Some(flag) = state.stop.take() {
                flag.store(true, Ordering::SeqCst);
            }
        }

        tracing::info!("crawl stop requested");
        self.events.emit(CrawlEvent::Stopped);
    }

    fn begin_run(&self) -> Result<Arc<AtomicBool>, CrawlError> {
        let mut state = self.run_state();
        if state.running {
            return Err(CrawlError::AlreadyRunning);
        }
        let stop = Arc::new(AtomicBool::new(false));
        state.running = true;
        state.stop = Some(Arc::clone(&stop));
        Ok(stop)
    }

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.run_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_outcome(&self, state: &mut CrawlState, outcome: CheckOutcome, stopped: bool) {
        if let Some(broken) = outcome.broken {
            tracing::warn!(url = %broken.url, reason = %broken.reason, "broken link");
            state.broken.push(broken);
        }

        if !stopped {
            for item in outcome.discovered {
                if state.visited.contains(&item.url) || self.ignore.is_ignored(&item.url) {
                    continue;
                }
                tracing::debug!(url = %item.url, recursive = item.is_recursive, "enqueue");
                state.queue.push_back(item);
            }
        }

        self.events.emit(CrawlEvent::Progress {
            checked: state.visited.len(),
            broken: state.broken.len(),
        });
    }

    // Checks one link and reports what happened
    //
    // HTTP status codes:
    // - 200-299: OK (and the page gets scanned if it's a recursive HTML page)
    // - anything else after the HTTP layer followed a redirect: redirect
    // - anything else: broken
    async fn check_link(&self, item: QueueItem) -> CheckOutcome {
        let parent = item.parent_url.as_deref();

        self.events.emit(CrawlEvent::LinkStart {
            url: item.url.clone(),
            parent_url: item.parent_url.clone(),
        });

        let response = match fetch_with_retry(
            &self.client,
            &self.options,
            &item.url,
            parent,
            &self.events,
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                self.events
                    .emit(CrawlEvent::link_unreachable(&item.url, parent, message.clone()));
                return CheckOutcome::broken(&item, format!("Error: {message}"));
            }
        };

        let status = response.status();
        let final_url = response.url().clone();

        if status.is_success() {
            self.events.emit(CrawlEvent::LinkSuccess {
                url: item.url.clone(),
                status_code: status.as_u16(),
                parent_url: item.parent_url.clone(),
            });

            if item.is_recursive && is_html(&response) {
                let discovered = self.discover_links(&item, response, &final_url).await;
                return CheckOutcome {
                    broken: None,
                    discovered,
                };
            }
            CheckOutcome::ok()
        } else if was_redirected(&item.url, &final_url) {
            self.events.emit(CrawlEvent::LinkRedirect {
                from: item.url.clone(),
                to: final_url.to_string(),
                parent_url: item.parent_url.clone(),
            });
            CheckOutcome::ok()
        } else {
            self.events
                .emit(CrawlEvent::link_failed(&item.url, parent, status.as_u16()));
            CheckOutcome::broken(&item, format!("Status code: {}", status.as_u16()))
        }
    }

    // Reads an HTML page and turns its links into queue items
    //
    // Links resolve against `final_url` (where redirects ended up), and only
    // links on that same origin get crawled further.
    async fn discover_links(
        &self,
        item: &QueueItem,
        response: Response,
        final_url: &Url,
    ) -> Vec<QueueItem> {
        // The per-request timeout also covers reading the body. A page whose
        // headers arrived in time has already counted as a success, so a body
        // that stalls past the timeout only loses the page's links.
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(
                    url = %item.url,
                    error = %e,
                    "couldn't read page body, its links are not crawled"
                );
                return Vec::new();
            }
        };

        extract_html_links(&body, final_url.as_str())
            .into_iter()
            .map(|link| {
                let is_recursive = is_same_origin(&link, final_url);
                QueueItem {
                    url: link,
                    parent_url: Some(item.url.clone()),
                    is_recursive,
                }
            })
            .collect()
    }
}

// Resets RunState when a run ends, however it ends (including the run
// future being dropped). Leaves it alone if a newer run has taken over.
struct RunGuard<'a> {
    crawler: &'a Crawler,
    stop: Arc<AtomicBool>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.crawler.run_state();
        let ours = state
            .stop
            .as_ref()
            .map_or(false, |current| Arc::ptr_eq(current, &self.stop));
        if ours {
            state.running = false;
            state.stop = None;
        }
    }
}

fn parse_seed(seed_url: &str) -> Result<String, CrawlError> {
    let url = Url::parse(seed_url).map_err(|e| CrawlError::InvalidSeedUrl {
        url: seed_url.to_string(),
        reason: e.to_string(),
    })?;

    if !is_http_scheme(&url) {
        return Err(CrawlError::InvalidSeedUrl {
            url: seed_url.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    Ok(url.into())
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.to_ascii_lowercase().contains("text/html"))
}

// Whether the HTTP layer followed a redirect away from `requested`.
// Fragments never reach the server, so they don't count.
fn was_redirected(requested: &str, final_url: &Url) -> bool {
    let Ok(mut requested) = Url::parse(requested) else {
        return true;
    };
    let mut final_url = final_url.clone();
    requested.set_fragment(None);
    final_url.set_fragment(None);
    requested != final_url
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why FuturesUnordered instead of tokio::spawn?
//    - Spawned tasks would run on other threads and need locks around the
//      queue and visited set
//    - Futures in a FuturesUnordered only make progress while `run` polls
//      them, so all the bookkeeping happens in one place, between awaits
//
// 2. What does active.next().await do?
//    - Waits until any one of the in-flight checks finishes
//    - Returns Some(outcome) for it, or None when the set is empty
//
// 3. Why is a URL marked visited before it's checked?
//    - Several pages can link to the same URL while its check is still
//      running; the visited set already has it, so it isn't queued again
//
// 4. What is Arc<AtomicBool>?
//    - A shared true/false flag that's safe to flip from another task
//    - stop() flips it, the dispatch loop reads it on every turn
// -----------------------------------------------------------------------------
