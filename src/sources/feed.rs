//! Syndication feed parsing.
//!
//! Bodies are handed to `feed-rs`, which understands RSS 0.9x/1.0/2.0, Atom
//! and JSON Feed and ignores extension namespaces (`atom:`, `media:`, `dc:`)
//! it has no use for. Only the four fields the digest needs are kept.
//!
//! Feeds in the wild often use HTML named entities (`&eacute;`, `&copy;`)
//! that XML does not define. When a body fails to parse, those entities are
//! rewritten as numeric character references and the parse is retried, so
//! one stray entity does not cost the whole feed.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::SecondsFormat;
use feed_rs::model::Entry;
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::Html;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]{1,31});").expect("entity pattern compiles"));

const XML_ENTITIES: [&str; 5] = ["amp", "lt", "gt", "quot", "apos"];

/// One entry as exposed by the parser, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Published (else updated) time as `YYYY-MM-DDTHH:MM:SSZ`, or empty.
    pub published: String,
}

impl From<Entry> for FeedEntry {
    fn from(entry: Entry) -> Self {
        let link = entry
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
            .or_else(|| entry.links.first())
            .map(|l| l.href.trim().to_string())
            .unwrap_or_default();
        let summary = entry
            .summary
            .map(|t| t.content)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        let published = entry
            .published
            .or(entry.updated)
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();

        Self {
            title: entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default(),
            link,
            summary: summary.trim().to_string(),
            published,
        }
    }
}

/// Parse a feed body into its entries, in document order.
///
/// # Arguments
///
/// * `body` - Raw response bytes. The encoding declared in the XML prolog is
///   honoured by the parser.
///
/// # Returns
///
/// The feed's entries. A well-formed feed with no entries yields an empty
/// list.
///
/// # Errors
///
/// [`IngestError::FeedParse`] when the body is not a feed and cannot be
/// recovered by entity repair. Nothing is returned in that case; a feed
/// only fails when no entries can be read from it.
pub fn parse_feed(body: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = match parser::parse(body) {
        Ok(feed) => feed,
        Err(first) => {
            let text = std::str::from_utf8(body)
                .map_err(|_| IngestError::FeedParse(first.to_string()))?;
            let repaired = repair_html_entities(text);
            if matches!(repaired, Cow::Borrowed(_)) {
                return Err(IngestError::FeedParse(first.to_string()));
            }
            let feed = parser::parse(repaired.as_bytes())
                .map_err(|_| IngestError::FeedParse(first.to_string()))?;
            warn!(error = %first, entries = feed.entries.len(), "Recovered feed after entity repair");
            feed
        }
    };

    debug!(entries = feed.entries.len(), "Parsed feed");
    Ok(feed.entries.into_iter().map(FeedEntry::from).collect())
}

/// Rewrite HTML named entities (anything beyond XML's five) as numeric
/// character references. Unknown names are left alone.
fn repair_html_entities(xml: &str) -> Cow<'_, str> {
    let mut decoded: HashMap<String, Option<String>> = HashMap::new();
    let mut changed = false;

    let out = NAMED_ENTITY.replace_all(xml, |caps: &Captures| {
        let name = &caps[1];
        if XML_ENTITIES.contains(&name) {
            return caps[0].to_string();
        }
        let text = decoded
            .entry(name.to_string())
            .or_insert_with(|| decode_html_entity(name));
        match text {
            Some(text) => {
                changed = true;
                text.chars().map(|c| format!("&#{};", u32::from(c))).collect()
            }
            None => caps[0].to_string(),
        }
    });

    if changed { out } else { Cow::Borrowed(xml) }
}

/// Resolve one named entity with the HTML5 entity table `scraper` carries.
///
/// HTML also accepts a few legacy names without the semicolon (`&not`), so
/// `&notit;` decodes to `¬it;`. Anything that still contains `;` was only
/// matched by prefix and is rejected.
fn decode_html_entity(name: &str) -> Option<String> {
    let literal = format!("&{name};");
    let fragment = Html::parse_fragment(&literal);
    let text: String = fragment.root_element().text().collect();
    (!text.is_empty() && !text.contains(';')).then_some(text)
}
