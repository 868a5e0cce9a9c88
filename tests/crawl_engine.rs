// tests/crawl_engine.rs
// =============================================================================
// End-to-end crawls against a fake site served by mockito.
// =============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use link_patrol::{CrawlError, CrawlEvent, CrawlOptions, Crawler, EventKind};
use mockito::{Mock, Server, ServerGuard};

// Serves `body` as an HTML page at `path`
async fn page(server: &mut ServerGuard, path: &str, body: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(body)
        .create_async()
        .await
}

async fn status(server: &mut ServerGuard, path: &str, code: usize) -> Mock {
    server
        .mock("GET", path)
        .with_status(code)
        .with_body("nope")
        .create_async()
        .await
}

fn fast_options() -> CrawlOptions {
    CrawlOptions {
        timeout: 2000,
        retry_delay: 10,
        ..CrawlOptions::default()
    }
}

// An address nothing listens on
fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/gone")
}

#[tokio::test]
async fn test_404_is_reported_with_parent() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", r#"<a href="/missing">missing</a>"#).await;
    let _missing = status(&mut server, "/missing", 404).await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&format!("{base}/")).await.unwrap();

    assert_eq!(report.broken_links.len(), 1);
    let broken = &report.broken_links[0];
    assert_eq!(broken.url, format!("{base}/missing"));
    assert!(broken.reason.contains("Status code: 404"));
    assert_eq!(broken.parent_url, Some(format!("{base}/")));
}

#[tokio::test]
async fn test_relative_links_are_visited_as_absolute() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", r#"<a href="/relative">rel</a>"#).await;
    let _rel = page(&mut server, "/relative", "<p>hi</p>").await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&base).await.unwrap();

    assert!(report
        .links_visited
        .contains(&format!("{base}/relative")));
    assert!(!report.links_visited.contains(&"/relative".to_string()));
    assert!(report.broken_links.is_empty());
}

#[tokio::test]
async fn test_mailto_is_never_visited() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(
        &mut server,
        "/",
        r#"<a href="mailto:someone@example.com">mail</a><a href="tel:123">call</a>"#,
    )
    .await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&base).await.unwrap();

    assert_eq!(report.links_visited, vec![format!("{base}/")]);
    assert!(report
        .links_visited
        .iter()
        .all(|url| !url.starts_with("mailto:") && !url.starts_with("tel:")));
}

#[tokio::test]
async fn test_duplicate_links_are_checked_once() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(
        &mut server,
        "/",
        r#"<a href="/a">1</a><a href="/a">2</a><a href="a">3</a><a href="./a">4</a>"#,
    )
    .await;
    let a = server
        .mock("GET", "/a")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<a href="/">home</a><a href="/a">self</a>"#)
        .expect(1)
        .create_async()
        .await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&format!("{base}/")).await.unwrap();

    let count = report
        .links_visited
        .iter()
        .filter(|url| **url == format!("{base}/a"))
        .count();
    assert_eq!(count, 1);
    a.assert_async().await;
}

#[tokio::test]
async fn test_cycle_terminates() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _a = page(&mut server, "/", r#"<a href="/b">b</a>"#).await;
    let _b = page(&mut server, "/b", r#"<a href="/">a</a><a href="/c">c</a>"#).await;
    let _c = page(&mut server, "/c", r#"<a href="/b">b</a><a href="/">a</a>"#).await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&base).await.unwrap();

    let mut visited = report.links_visited.clone();
    visited.sort();
    assert_eq!(
        visited,
        vec![
            format!("{base}/"),
            format!("{base}/b"),
            format!("{base}/c"),
        ]
    );
}

#[tokio::test]
async fn test_ignored_links_are_skipped() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(
        &mut server,
        "/",
        r#"<a href="/private/secret">skip</a><a href="/public">keep</a>"#,
    )
    .await;
    let secret = server
        .mock("GET", "/private/secret")
        .with_status(500)
        .expect(0)
        .create_async()
        .await;
    let public = server
        .mock("GET", "/public")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let options = CrawlOptions {
        ignore_links: vec!["/private/".to_string()],
        ..fast_options()
    };
    let crawler = Crawler::new(options).unwrap();
    let report = crawler.run(&base).await.unwrap();

    assert!(report.links_visited.contains(&format!("{base}/public")));
    assert!(!report
        .links_visited
        .contains(&format!("{base}/private/secret")));
    assert!(report.broken_links.is_empty());
    secret.assert_async().await;
    public.assert_async().await;
}

#[tokio::test]
async fn test_ignored_seed_checks_nothing() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let seed = server
        .mock("GET", "/")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let options = CrawlOptions {
        ignore_links: vec!["127\\.0\\.0\\.1".to_string()],
        ..fast_options()
    };
    let crawler = Crawler::new(options).unwrap();
    let report = crawler.run(&base).await.unwrap();

    assert!(report.links_visited.is_empty());
    seed.assert_async().await;
}

#[tokio::test]
async fn test_other_origins_are_checked_but_not_crawled() {
    let mut site = Server::new_async().await;
    let mut other = Server::new_async().await;
    let other_base = other.url();

    let seed_body = format!(r#"<a href="{other_base}/page">elsewhere</a>"#);
    let _seed = page(&mut site, "/", &seed_body).await;
    let other_page = other
        .mock("GET", "/page")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(r#"<a href="/deeper">deeper</a>"#)
        .expect(1)
        .create_async()
        .await;
    let deeper = other
        .mock("GET", "/deeper")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&site.url()).await.unwrap();

    assert!(report
        .links_visited
        .contains(&format!("{other_base}/page")));
    assert_eq!(report.links_visited.len(), 2);
    other_page.assert_async().await;
    deeper.assert_async().await;
}

#[tokio::test]
async fn test_non_html_pages_are_not_scanned() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", r#"<a href="/data.txt">data</a>"#).await;
    let _data = server
        .mock("GET", "/data.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body(r#"<a href="/hidden">not a link here</a>"#)
        .create_async()
        .await;
    let hidden = server
        .mock("GET", "/hidden")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&base).await.unwrap();

    assert_eq!(report.links_visited.len(), 2);
    hidden.assert_async().await;
}

#[tokio::test]
async fn test_redirected_page_links_resolve_against_final_url() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", r#"<a href="/old/start">moved</a>"#).await;
    let _moved = server
        .mock("GET", "/old/start")
        .with_status(301)
        .with_header("location", "/docs/index")
        .create_async()
        .await;
    let _docs = page(&mut server, "/docs/index", r#"<a href="child">child</a>"#).await;
    let child = server
        .mock("GET", "/docs/child")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let report = crawler.run(&base).await.unwrap();

    assert!(report.links_visited.contains(&format!("{base}/docs/child")));
    assert!(report.broken_links.is_empty());
    child.assert_async().await;
}

#[tokio::test]
async fn test_redirect_to_error_is_reported_as_redirect() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", r#"<a href="/old">old</a>"#).await;
    let _old = server
        .mock("GET", "/old")
        .with_status(302)
        .with_header("location", "/gone")
        .create_async()
        .await;
    let _gone = status(&mut server, "/gone", 404).await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let redirects = Arc::new(Mutex::new(Vec::new()));
    let r = Arc::clone(&redirects);
    crawler.events().on(EventKind::LinkRedirect, move |event| {
        if let CrawlEvent::LinkRedirect { from, to, .. } = event {
            r.lock().unwrap().push((from.clone(), to.clone()));
        }
    });

    let report = crawler.run(&base).await.unwrap();

    assert!(report.broken_links.is_empty());
    assert_eq!(
        *redirects.lock().unwrap(),
        vec![(format!("{base}/old"), format!("{base}/gone"))]
    );
}

#[tokio::test]
async fn test_unreachable_link_exhausts_retries() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let dead = dead_url();
    let seed_body = format!(r#"<a href="{dead}">dead</a>"#);
    let _seed = page(&mut server, "/", &seed_body).await;

    let options = CrawlOptions {
        retries: 3,
        ..fast_options()
    };
    let crawler = Crawler::new(options).unwrap();
    let retries = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&retries);
    crawler.events().on(EventKind::Retry, move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    let report = crawler.run(&base).await.unwrap();

    assert_eq!(report.broken_links.len(), 1);
    let broken = &report.broken_links[0];
    assert_eq!(broken.url, dead);
    assert!(broken.reason.starts_with("Error: "));
    assert!(broken.reason.contains("3 attempt"));
    assert_eq!(retries.load(Ordering::SeqCst), 2);
}

// Accepts connections and holds them open without ever answering
async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://127.0.0.1:{port}/slow")
}

#[tokio::test]
async fn test_each_attempt_times_out() {
    let slow = silent_server().await;

    let options = CrawlOptions {
        timeout: 100,
        retries: 2,
        ..fast_options()
    };
    let crawler = Crawler::new(options).unwrap();
    let retries = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&retries);
    crawler.events().on(EventKind::Retry, move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    let report = crawler.run(&slow).await.unwrap();

    assert_eq!(report.links_visited, vec![slow.clone()]);
    assert_eq!(report.broken_links.len(), 1);
    let broken = &report.broken_links[0];
    assert_eq!(broken.url, slow);
    assert!(broken.reason.starts_with("Error: "), "{}", broken.reason);
    assert!(broken.reason.contains("timed out"), "{}", broken.reason);
    assert_eq!(retries.load(Ordering::SeqCst), 1);
}

// Sends the headers and the start of an HTML body, then stalls
async fn stalling_page_server() -> String {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((mut socket, _)) = listener.accept().await {
            let head = "HTTP/1.1 200 OK\r\n\
                        content-type: text/html\r\n\
                        content-length: 10000\r\n\r\n\
                        <a href=\"/child\">child</a>";
            let _ = socket.write_all(head.as_bytes()).await;
            held.push(socket);
        }
    });
    format!("http://127.0.0.1:{port}/")
}

#[tokio::test]
async fn test_stalled_body_counts_as_success_without_links() {
    let seed = stalling_page_server().await;

    let options = CrawlOptions {
        timeout: 200,
        retries: 1,
        ..fast_options()
    };
    let crawler = Crawler::new(options).unwrap();
    let successes = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&successes);
    crawler.events().on(EventKind::LinkSuccess, move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    let report = crawler.run(&seed).await.unwrap();

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert!(report.broken_links.is_empty());
    assert_eq!(report.links_visited, vec![seed]);
}

#[tokio::test]
async fn test_concurrency_bound_is_respected() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{i}">{i}</a>"#))
        .collect();
    let _seed = page(&mut server, "/", &links).await;
    let mut pages = Vec::new();
    for i in 0..10 {
        pages.push(page(&mut server, &format!("/p{i}"), "<p>leaf</p>").await);
    }

    let options = CrawlOptions {
        concurrency: 2,
        ..fast_options()
    };
    let crawler = Crawler::new(options).unwrap();

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
    crawler.events().on_any(move |event| match event.kind() {
        EventKind::LinkStart => {
            let now = f.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
        }
        EventKind::LinkSuccess | EventKind::LinkError | EventKind::LinkRedirect => {
            f.fetch_sub(1, Ordering::SeqCst);
        }
        _ => {}
    });

    let report = crawler.run(&base).await.unwrap();

    assert_eq!(report.links_visited.len(), 11);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn test_event_sequence() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", r#"<a href="/missing">x</a>"#).await;
    let _missing = status(&mut server, "/missing", 500).await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let mut rx = crawler.events().subscribe();
    let report = crawler.run(&base).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(
        events.first(),
        Some(&CrawlEvent::Start {
            seed_url: format!("{base}/")
        })
    );
    assert_eq!(events.last(), Some(&CrawlEvent::Complete(report.clone())));
    assert!(events.contains(&CrawlEvent::LinkError {
        url: format!("{base}/missing"),
        status_code: Some(500),
        error: None,
        parent_url: Some(format!("{base}/")),
    }));

    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Progress { checked, broken } => Some((*checked, *broken)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 2);
    assert_eq!(progress.last(), Some(&(2, 1)));
    assert!(!events.contains(&CrawlEvent::Stopped));
}

#[tokio::test]
async fn test_run_is_not_reentrant() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let _seed = page(&mut server, "/", "<p>alone</p>").await;

    let crawler = Crawler::new(fast_options()).unwrap();
    let (first, second) = tokio::join!(crawler.run(&base), crawler.run(&base));

    // Whichever run got polled first owns the crawler; the other bounces
    let (ok, rejected) = if first.is_ok() {
        (first, second)
    } else {
        (second, first)
    };
    assert!(ok.is_ok());
    assert!(matches!(rejected, Err(CrawlError::AlreadyRunning)));
    assert!(!crawler.is_running());

    // Idle again, so a fresh run works
    let again = crawler.run(&base).await.unwrap();
    assert_eq!(again.links_visited, vec![format!("{base}/")]);
}

#[tokio::test]
async fn test_stop_drops_queue_and_skips_complete() {
    let mut server = Server::new_async().await;
    let base = server.url();
    let links: String = (0..5)
        .map(|i| format!(r#"<a href="/p{i}">{i}</a>"#))
        .collect();
    let _seed = page(&mut server, "/", &links).await;
    let never = server
        .mock("GET", mockito::Matcher::Regex(r"^/p\d$".to_string()))
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let options = CrawlOptions {
        concurrency: 1,
        ..fast_options()
    };
    let crawler = Arc::new(Crawler::new(options).unwrap());
    let weak = Arc::downgrade(&crawler);
    crawler.events().on(EventKind::LinkSuccess, move |_| {
        if let Some(crawler) = weak.upgrade() {
            crawler.stop();
        }
    });
    let mut rx = crawler.events().subscribe();

    let report = crawler.run(&base).await.unwrap();

    assert_eq!(report.links_visited, vec![format!("{base}/")]);
    assert!(!crawler.is_running());

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(
        kinds.iter().filter(|k| **k == EventKind::Stopped).count(),
        1
    );
    assert!(!kinds.contains(&EventKind::Complete));
    never.assert_async().await;
}

#[tokio::test]
async fn test_invalid_seed_is_rejected() {
    let crawler = Crawler::new(fast_options()).unwrap();
    let result = crawler.run("mailto:someone@example.com").await;
    assert!(matches!(result, Err(CrawlError::InvalidSeedUrl { .. })));
}
