//! # NewsData Digest
//!
//! Two small ingestion pipelines that share one identity, merge and output
//! layer:
//!
//! - **news**: fetch one page of articles from the NewsData API and append
//!   the unseen ones to a deduplicated JSON store, with an audit record per
//!   request.
//! - **digest**: read a catalog of RSS/Atom feeds, collect and normalize
//!   recent items, drop cross-feed duplicates, optionally annotate them with
//!   LLM-generated summaries and tags, and write a dated snapshot.
//!
//! ## Usage
//!
//! ```sh
//! newsdata_digest news --query "interest rates" --size 10
//! newsdata_digest digest --max-sources 5 --skip-openai
//! ```
//!
//! ## Architecture
//!
//! Each run is linear and single-threaded:
//! 1. **Load**: read the existing store or the feed catalog (corrupt input aborts)
//! 2. **Fetch**: one NewsData page, or each selected feed in turn
//! 3. **Merge**: identity keys decide what is new; duplicates are skipped
//! 4. **Output**: ASCII-escaped, two-space indented JSON written in place
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); stdout carries only the
//! one-line run summary.

use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod catalog;
mod cli;
mod credentials;
mod error;
mod identity;
mod models;
mod outputs;
mod pipelines;
mod sources;
mod store;
mod utils;

use api::{DEFAULT_MODEL, OpenAiClient};
use catalog::parse_source_ids;
use cli::{Cli, Command, DigestArgs, NewsArgs};
use credentials::Credentials;
use error::Result;
use models::QueryParams;
use pipelines::{digest, news};
use sources::newsdata::NewsDataClient;
use sources::rss::HttpFeedFetcher;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let start_time = Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let outcome = match args.command {
        Command::News(args) => run_news(args).await,
        Command::Digest(args) => run_digest(args).await,
    };
    let elapsed_ms = start_time.elapsed().as_millis();

    match outcome {
        Ok(()) => {
            info!(elapsed_ms, "Run finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, elapsed_ms, "Run failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_news(args: NewsArgs) -> Result<()> {
    let credentials = Credentials::new(args.env_files);
    let api_key = credentials.require("NEWSDATA_API_KEY", args.api_key.as_deref())?;
    let client = NewsDataClient::new(api_key)?;

    let settings = news::NewsSettings {
        params: QueryParams {
            query: args.query,
            category: args.category,
            country: args.country,
            language: args.language,
            size: args.size,
            page: args.page,
        },
        output: args.output,
    };
    let report = news::run(&client, &settings).await?;
    info!(total_articles = report.total_articles, "Article store updated");

    println!(
        "Saved {} new article(s), skipped {}. Output: {}",
        report.outcome.added,
        report.outcome.skipped,
        report.output.display()
    );
    Ok(())
}

async fn run_digest(args: DigestArgs) -> Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let credentials = Credentials::new(args.env_files);
    let fetcher = HttpFeedFetcher::new(timeout)?;

    let settings = digest::DigestSettings {
        catalog_path: args.catalog,
        output: args.output,
        archive_dir: (!args.no_archive).then_some(args.archive_dir),
        max_sources: args.max_sources,
        feeds_per_source: args.feeds_per_source,
        max_items_per_feed: args.max_items_per_feed,
        source_ids: parse_source_ids(args.source_ids.as_deref()),
        skip_summary: args.skip_openai,
    };

    let openai_model = args.openai_model;
    let summarizer = || -> Result<OpenAiClient> {
        let api_key = credentials.require("OPENAI_API_KEY", None)?;
        let model = credentials
            .lookup("OPENAI_MODEL", openai_model.as_deref())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        info!(%model, "Summarizer configured");
        OpenAiClient::new(api_key, model, timeout)
    };
    let report = digest::run(&settings, &fetcher, summarizer).await?;

    println!("Wrote {} items to {}", report.items, report.output.display());
    info!(
        items = report.items,
        summarized = report.summarized,
        archive = ?report.archive,
        "Digest complete"
    );
    if report.errors > 0 {
        eprintln!("Encountered {} feed errors.", report.errors);
    }
    Ok(())
}
