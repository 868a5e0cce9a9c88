// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes (the #[...] things).
//
//   link-patrol --url https://example.com
//   link-patrol --url https://example.com --config link-patrol.json --json
// =============================================================================

use std::path::PathBuf;

use clap::Parser;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to automatically generate parsing code
#[derive(Parser, Debug)]
#[command(
    name = "link-patrol",
    version,
    about = "Crawl a website and report broken links",
    long_about = "link-patrol starts at a URL, follows every link on the same site, and checks \
                  that every link it finds (internal or external) is reachable. \
                  Exits with code 1 if any link is broken."
)]
pub struct Cli {
    /// Website URL to start crawling from (e.g., https://example.com)
    #[arg(short, long)]
    pub url: String,

    /// Path to a JSON config file (ignoreLinks, headers, concurrency, ...)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output the final report as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Show debug logs from the crawler on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
