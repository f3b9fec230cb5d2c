//! Feed catalog loading and feed selection.

use std::path::Path;

use tracing::{info, instrument};

use crate::error::{IngestError, Result};
use crate::models::{Catalog, FeedSelection};

/// Read the catalog at `path`. `.yaml`/`.yml` files are parsed as YAML,
/// everything else as JSON. Any failure is fatal for the run.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path).map_err(|e| IngestError::corrupt(path, e))?;
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

    let catalog: Catalog = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| IngestError::corrupt(path, e))?
    } else {
        serde_json::from_str(&content).map_err(|e| IngestError::corrupt(path, e))?
    };

    info!(
        sources = catalog.sources.as_ref().map_or(0, Vec::len),
        "Loaded feed catalog"
    );
    Ok(catalog)
}

/// Pick feeds from the catalog in order.
///
/// Sources not named in `source_ids` are skipped when the filter is
/// non-empty; at most `max_sources` sources are used and the first
/// `feeds_per_source` feeds of each. Feeds without a URL are dropped.
pub fn select_feeds(
    catalog: &Catalog,
    max_sources: usize,
    feeds_per_source: usize,
    source_ids: &[String],
) -> Vec<FeedSelection> {
    catalog
        .sources
        .iter()
        .flatten()
        .filter(|source| {
            source_ids.is_empty()
                || source
                    .id
                    .as_ref()
                    .is_some_and(|id| source_ids.contains(id))
        })
        .take(max_sources)
        .flat_map(|source| {
            source
                .feeds
                .iter()
                .flatten()
                .take(feeds_per_source)
                .filter_map(move |feed| {
                    Some(FeedSelection {
                        source_id: source.id.clone(),
                        source_name: source.name.clone(),
                        feed_name: feed.name.clone(),
                        feed_url: feed.url.clone().filter(|u| !u.trim().is_empty())?,
                        topic_tags: feed.topic_tags.clone().unwrap_or_default(),
                    })
                })
        })
        .collect()
}

/// Split a comma-separated `--source-ids` value, dropping blanks.
pub fn parse_source_ids(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
