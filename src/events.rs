// src/events.rs
// =============================================================================
// Crawl notifications.
//
// The crawler reports what it's doing through an `EventBus`. Anyone can
// subscribe:
// - `on(EventKind::LinkError, handler)` for one channel
// - `on_any(handler)` for every channel
// - `subscribe()` for an async receiver of every event
//
// Handlers run in the order they were registered, on the task that emitted
// the event, so they should be quick (print a line, bump a counter, send on
// a channel).
// =============================================================================

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::crawl::CrawlReport;

/// One notification from a running crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum CrawlEvent {
    #[serde(rename = "start", rename_all = "camelCase")]
    Start {
        seed_url: String,
    },
    #[serde(rename = "complete")]
    Complete(CrawlReport),
    #[serde(rename = "stopped")]
    Stopped,
    #[serde(rename = "link:start", rename_all = "camelCase")]
    LinkStart {
        url: String,
        parent_url: Option<String>,
    },
    #[serde(rename = "link:success", rename_all = "camelCase")]
    LinkSuccess {
        url: String,
        status_code: u16,
        parent_url: Option<String>,
    },
    #[serde(rename = "link:redirect", rename_all = "camelCase")]
    LinkRedirect {
        from: String,
        to: String,
        parent_url: Option<String>,
    },
    /// Either `status_code` (HTTP failure) or `error` (transport failure) is set.
    #[serde(rename = "link:error", rename_all = "camelCase")]
    LinkError {
        url: String,
        status_code: Option<u16>,
        error: Option<String>,
        parent_url: Option<String>,
    },
    #[serde(rename = "progress")]
    Progress {
        checked: usize,
        broken: usize,
    },
    #[serde(rename = "retry", rename_all = "camelCase")]
    Retry {
        url: String,
        attempt: u32,
        error: String,
        parent_url: Option<String>,
    },
}

/// The channel an event is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Complete,
    Stopped,
    LinkStart,
    LinkSuccess,
    LinkRedirect,
    LinkError,
    Progress,
    Retry,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Complete => "complete",
            EventKind::Stopped => "stopped",
            EventKind::LinkStart => "link:start",
            EventKind::LinkSuccess => "link:success",
            EventKind::LinkRedirect => "link:redirect",
            EventKind::LinkError => "link:error",
            EventKind::Progress => "progress",
            EventKind::Retry => "retry",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl CrawlEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CrawlEvent::Start { .. } => EventKind::Start,
            CrawlEvent::Complete(_) => EventKind::Complete,
            CrawlEvent::Stopped => EventKind::Stopped,
            CrawlEvent::LinkStart { .. } => EventKind::LinkStart,
            CrawlEvent::LinkSuccess { .. } => EventKind::LinkSuccess,
            CrawlEvent::LinkRedirect { .. } => EventKind::LinkRedirect,
            CrawlEvent::LinkError { .. } => EventKind::LinkError,
            CrawlEvent::Progress { .. } => EventKind::Progress,
            CrawlEvent::Retry { .. } => EventKind::Retry,
        }
    }

    pub(crate) fn link_failed(url: &str, parent_url: Option<&str>, status_code: u16) -> Self {
        CrawlEvent::LinkError {
            url: url.to_string(),
            status_code: Some(status_code),
            error: None,
            parent_url: parent_url.map(str::to_string),
        }
    }

    pub(crate) fn link_unreachable(url: &str, parent_url: Option<&str>, error: String) -> Self {
        CrawlEvent::LinkError {
            url: url.to_string(),
            status_code: None,
            error: Some(error),
            parent_url: parent_url.map(str::to_string),
        }
    }
}

type Handler = Arc<dyn Fn(&CrawlEvent) + Send + Sync>;

struct Subscriber {
    kind: Option<EventKind>,
    handler: Handler,
}

/// Multi-subscriber publisher for `CrawlEvent`s.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `handler` for every event on the `kind` channel.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&CrawlEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler));
    }

    /// Calls `handler` for every event on every channel.
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&CrawlEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler));
    }

    /// Returns a receiver that gets a copy of every event emitted from now on.
    ///
    /// Once the receiver is dropped its sends fail silently.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CrawlEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.on_any(move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn emit(&self, event: CrawlEvent) {
        // Snapshot the handlers so one of them can register another without
        // deadlocking on the lock.
        let handlers: Vec<Handler> = {
            let subs = match self.subscribers.read() {
                Ok(subs) => subs,
                Err(poisoned) => poisoned.into_inner(),
            };
            let kind = event.kind();
            subs.iter()
                .filter(|s| s.kind.map_or(true, |k| k == kind))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        tracing::trace!(event = %event.kind(), "emit");
        for handler in handlers {
            handler(&event);
        }
    }

    fn register(&self, kind: Option<EventKind>, handler: Handler) {
        let mut subs = match self.subscribers.write() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.push(Subscriber { kind, handler });
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
