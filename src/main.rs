// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Load the (optional) config file
// 3. Crawl the site, printing failures as they happen
// 4. Print the report
// 5. Exit with proper code (0 = no broken links, 1 = broken links or error)
//
// Ctrl-C stops the crawl; whatever was found up to then is still reported.
// A second Ctrl-C exits right away with code 1.
// =============================================================================

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use link_patrol::{load_options, CrawlEvent, CrawlReport, Crawler, EventKind};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = no broken links
//   Ok(1) = broken links found
//   Err = config, seed URL or setup problem
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = load_options(cli.config.as_deref()).context("failed to load config")?;
    let crawler = Arc::new(Crawler::new(options)?);

    if !cli.json {
        print_live_updates(&crawler);
        println!("🔍 Crawling: {}", cli.url);
    }

    let stopper = Arc::clone(&crawler);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("\n⏹️  Stopping, waiting for in-flight checks (Ctrl-C again to quit)...");
        stopper.stop();

        // A second Ctrl-C gives up on the in-flight checks
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("⏹️  Aborted");
            std::process::exit(1);
        }
    });

    let report = crawler.run(&cli.url).await?;

    print_report(&report, cli.json)?;

    if report.has_broken_links() {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Logs go to stderr so they never mix with the report (or the JSON) on stdout
//
// RUST_LOG wins if set; otherwise warn, or debug with --verbose
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Prints problems as soon as the crawler reports them
fn print_live_updates(crawler: &Crawler) {
    let events = crawler.events();

    events.on(EventKind::LinkError, |event| {
        if let CrawlEvent::LinkError {
            url,
            status_code,
            error,
            ..
        } = event
        {
            match (status_code, error) {
                (Some(code), _) => println!("   ❌ {} (HTTP {})", url, code),
                (None, Some(error)) => println!("   ❌ {} ({})", url, error),
                (None, None) => println!("   ❌ {}", url),
            }
        }
    });

    events.on(EventKind::LinkRedirect, |event| {
        if let CrawlEvent::LinkRedirect { from, to, .. } = event {
            println!("   🔀 {} -> {}", from, to);
        }
    });

    events.on(EventKind::Retry, |event| {
        if let CrawlEvent::Retry {
            url,
            attempt,
            error,
            ..
        } = event
        {
            println!("   🔁 retrying {} (attempt {} failed: {})", url, attempt, error);
        }
    });

    events.on(EventKind::Stopped, |_| {
        println!("⏹️  Crawl stopped");
    });
}

// Prints the report either as text or JSON
fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
        return Ok(());
    }

    println!();
    println!("📊 Summary:");
    println!("   📋 Checked: {}", report.links_visited.len());
    println!("   ❌ Broken: {}", report.broken_links.len());

    if report.has_broken_links() {
        println!();
        for broken in &report.broken_links {
            match &broken.parent_url {
                Some(parent) => {
                    println!("❌ {} ({}) found on {}", broken.url, broken.reason, parent)
                }
                None => println!("❌ {} ({})", broken.url, broken.reason),
            }
        }
    } else {
        println!("✅ No broken links found");
    }

    Ok(())
}
