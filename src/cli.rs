//! Command-line interface definitions.
//!
//! Two subcommands share one binary: `news` appends a NewsData page to the
//! article store, `digest` builds the daily RSS snapshot. Defaults mirror the
//! repository layout (`data/`, `feed_catalog/`).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level command line.
///
/// # Examples
///
/// ```sh
/// # Append the latest US business headlines
/// newsdata_digest news --category business --size 10
///
/// # Digest two sources without calling the summarizer
/// newsdata_digest digest --source-ids bbc,npr --skip-openai
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one NewsData page and merge it into the article store
    News(NewsArgs),
    /// Build the RSS digest snapshot, optionally with LLM summaries
    Digest(DigestArgs),
}

#[derive(Args, Debug)]
pub struct NewsArgs {
    /// Free-text search query
    #[arg(short, long)]
    pub query: Option<String>,

    #[arg(long, default_value = "top")]
    pub category: String,

    #[arg(long, default_value = "us")]
    pub country: String,

    #[arg(long, default_value = "en")]
    pub language: String,

    /// Number of articles to request
    #[arg(long, default_value_t = 1)]
    pub size: u32,

    /// Pagination token from a previous response's `nextPage`
    #[arg(long)]
    pub page: Option<String>,

    /// Article store to merge into
    #[arg(short, long, default_value = "data/newsdata_dump.json")]
    pub output: PathBuf,

    /// NewsData API key
    #[arg(long, env = "NEWSDATA_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Env files scanned for credentials, in order
    #[arg(long = "env-file", default_values = [".env", "RSS_Feeds/.env"])]
    pub env_files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Feed catalog (JSON, or YAML by extension)
    #[arg(long, default_value = "feed_catalog/rss_feeds.json")]
    pub catalog: PathBuf,

    /// Snapshot output path
    #[arg(short, long, default_value = "data/rss_openai_daily.json")]
    pub output: PathBuf,

    /// Directory for dated snapshot copies
    #[arg(long, default_value = "data/history")]
    pub archive_dir: PathBuf,

    /// Skip the dated archive copy
    #[arg(long)]
    pub no_archive: bool,

    #[arg(long, default_value_t = 10)]
    pub max_sources: usize,

    #[arg(long, default_value_t = 1)]
    pub feeds_per_source: usize,

    #[arg(long, default_value_t = 3)]
    pub max_items_per_feed: usize,

    /// HTTP timeout in seconds for feeds and the summarizer
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Comma-separated source ids to include
    #[arg(long)]
    pub source_ids: Option<String>,

    /// Summarizer model (falls back to OPENAI_MODEL, then the built-in default)
    #[arg(long)]
    pub openai_model: Option<String>,

    /// Do not call the summarizer
    #[arg(long)]
    pub skip_openai: bool,

    /// Env files scanned for credentials, in order
    #[arg(long = "env-file", default_values = [".env"])]
    pub env_files: Vec<PathBuf>,
}
