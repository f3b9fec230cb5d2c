//! Digest pipeline: catalog → feeds → deduplicated items → optional
//! summaries → snapshot on disk.
//!
//! Feeds are fetched one after another. A feed that fails is recorded in
//! the snapshot's `errors` list and the run carries on; everything else
//! (catalog, summarization, writing) aborts the run before any file is
//! touched.

use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tracing::{error, info, instrument, warn};

use crate::api::{AskAsync, summarize_items};
use crate::catalog::{load_catalog, select_feeds};
use crate::error::{IngestError, Result};
use crate::identity::run_dedupe_key;
use crate::models::{DigestItem, DigestRequest, DigestSnapshot, FeedError, FeedSelection};
use crate::outputs::json::{archive_path, write_document};
use crate::sources::FeedSource;
use crate::sources::rss::fetch_feed_items;
use crate::store::SCHEMA_VERSION;
use crate::utils::utc_now;

#[derive(Debug, Clone)]
pub struct DigestSettings {
    pub catalog_path: PathBuf,
    pub output: PathBuf,
    /// `None` disables the dated archive copy.
    pub archive_dir: Option<PathBuf>,
    pub max_sources: usize,
    pub feeds_per_source: usize,
    pub max_items_per_feed: usize,
    pub source_ids: Vec<String>,
    pub skip_summary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestReport {
    pub items: usize,
    pub errors: usize,
    pub summarized: bool,
    pub output: PathBuf,
    pub archive: Option<PathBuf>,
}

/// Fetch every selected feed in order and flatten the results.
///
/// Items keep first-seen order; later items whose link (or title, or id)
/// was already seen in this run are dropped.
#[instrument(level = "info", skip_all, fields(feeds = feeds.len()))]
pub async fn collect_items<F: FeedSource>(
    source: &F,
    feeds: &[FeedSelection],
    max_items_per_feed: usize,
) -> (Vec<DigestItem>, Vec<FeedError>) {
    let outcomes: Vec<(&FeedSelection, Result<Vec<DigestItem>>)> = stream::iter(feeds)
        .then(|feed| async move { (feed, fetch_feed_items(source, feed, max_items_per_feed).await) })
        .collect()
        .await;

    let mut items = Vec::new();
    let mut errors = Vec::new();
    for (feed, outcome) in outcomes {
        match outcome {
            Ok(batch) => items.extend(batch),
            Err(e) => {
                if e.is_feed_scoped() {
                    warn!(feed_url = %feed.feed_url, error = %e, "Feed failed; continuing");
                } else {
                    error!(feed_url = %feed.feed_url, error = %e, "Unexpected feed failure; continuing");
                }
                errors.push(FeedError {
                    feed_url: feed.feed_url.clone(),
                    source_id: feed.source_id.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    let before = items.len();
    let items: Vec<DigestItem> = items
        .into_iter()
        .unique_by(|item| run_dedupe_key(item).to_string())
        .collect();
    info!(
        items = items.len(),
        duplicates = before - items.len(),
        errors = errors.len(),
        "Collected feed items"
    );
    (items, errors)
}

/// Run the digest end to end.
///
/// `summarizer` is only invoked when there is something to summarize and
/// summarization is enabled, so a missing credential does not matter for
/// `--skip-openai` runs or empty digests.
#[instrument(level = "info", skip_all, fields(catalog = %settings.catalog_path.display()))]
pub async fn run<F, A, B>(settings: &DigestSettings, source: &F, summarizer: B) -> Result<DigestReport>
where
    F: FeedSource,
    A: AskAsync,
    B: FnOnce() -> Result<A>,
{
    let catalog = load_catalog(&settings.catalog_path)?;
    let feeds = select_feeds(
        &catalog,
        settings.max_sources,
        settings.feeds_per_source,
        &settings.source_ids,
    );
    if feeds.is_empty() {
        return Err(IngestError::NoFeedsSelected);
    }
    info!(feeds = feeds.len(), "Selected feeds");

    let generated_at = utc_now();
    let (mut items, errors) = collect_items(source, &feeds, settings.max_items_per_feed).await;
    for item in &mut items {
        item.fetched_at = Some(generated_at.clone());
    }

    let openai = if items.is_empty() || settings.skip_summary {
        None
    } else {
        let api = summarizer()?;
        Some(summarize_items(&api, &mut items).await?)
    };

    let snapshot = DigestSnapshot {
        schema_version: SCHEMA_VERSION.to_string(),
        generated_at: generated_at.clone(),
        catalog_path: settings.catalog_path.display().to_string(),
        request: DigestRequest {
            max_sources: settings.max_sources,
            feeds_per_source: settings.feeds_per_source,
            max_items_per_feed: settings.max_items_per_feed,
            source_ids: settings.source_ids.clone(),
        },
        openai,
        items,
        errors,
    };

    write_document(&snapshot, &settings.output).await?;
    let archive = match &settings.archive_dir {
        Some(dir) => {
            let path = archive_path(dir, &settings.output, &generated_at);
            write_document(&snapshot, &path).await?;
            Some(path)
        }
        None => None,
    };

    Ok(DigestReport {
        items: snapshot.items.len(),
        errors: snapshot.errors.len(),
        summarized: snapshot.openai.is_some(),
        output: settings.output.clone(),
        archive,
    })
}
