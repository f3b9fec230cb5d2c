//! RSS fetching and item normalization for the digest pipeline.
//!
//! A feed is fetched with one GET (custom user agent, bounded timeout),
//! parsed with [`crate::sources::feed::parse_feed`], truncated to the
//! configured number of entries and turned into [`DigestItem`]s.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::{IngestError, Result};
use crate::identity::digest_item_id;
use crate::models::{DigestItem, FeedSelection};
use crate::sources::FeedSource;
use crate::sources::feed::{FeedEntry, parse_feed};
use crate::utils::{compact_text, strip_html, truncate_for_log};

pub const USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com)"
);

const TITLE_LIMIT: usize = 200;
const SUMMARY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl FeedSource for HttpFeedFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>> {
        let t0 = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_for_log(&body, 200), "Feed returned HTTP error");
            return Err(IngestError::Upstream(format!("HTTP {status}")));
        }
        let bytes = response.bytes().await?;
        debug!(
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched feed body"
        );
        Ok(bytes.to_vec())
    }
}

/// Convert parsed entries into digest items, keeping at most `max_items`.
pub fn normalize_entries(
    feed: &FeedSelection,
    entries: Vec<FeedEntry>,
    max_items: usize,
) -> Vec<DigestItem> {
    entries
        .into_iter()
        .take(max_items)
        .map(|entry| {
            let title = compact_text(entry.title.trim(), TITLE_LIMIT);
            let link = entry.link.trim().to_string();
            let summary = compact_text(&strip_html(&entry.summary), SUMMARY_LIMIT);
            DigestItem {
                id: digest_item_id(feed.source_id.as_deref(), &link, &title),
                title,
                link,
                summary,
                published: entry.published.trim().to_string(),
                source_id: feed.source_id.clone(),
                source_name: feed.source_name.clone(),
                feed_name: feed.feed_name.clone(),
                feed_url: feed.feed_url.clone(),
                topic_tags: feed.topic_tags.clone(),
                fetched_at: None,
                ai_summary: None,
                ai_tags: None,
            }
        })
        .collect()
}

/// Fetch, parse and normalize one feed.
#[instrument(level = "info", skip_all, fields(feed_url = %feed.feed_url))]
pub async fn fetch_feed_items<F: FeedSource>(
    source: &F,
    feed: &FeedSelection,
    max_items: usize,
) -> Result<Vec<DigestItem>> {
    let body = source.fetch_feed(&feed.feed_url).await?;
    let entries = parse_feed(&body)?;
    let items = normalize_entries(feed, entries, max_items);
    debug!(count = items.len(), "Normalized feed items");
    Ok(items)
}
