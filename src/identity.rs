//! Identity keys used to detect duplicate records.
//!
//! Store-level keys are namespaced by the rule that produced them so that,
//! for example, an article whose id happens to equal another article's URL
//! can never collide with it:
//!
//! | Tier | Source field(s) | Key |
//! |------|-----------------|-----|
//! | 1 | `article_id` | `id:{article_id}` |
//! | 2 | `link` | `link:{link}` |
//! | 3 | `title`, `pubDate`/`published_at`, `source_id`/`source_name` | `fallback:{title}\|{date}\|{source}` |
//!
//! All functions here are pure and never fail; missing or non-object input
//! degrades to empty components.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::DigestItem;
use crate::utils::is_truthy;

/// Derive the store identity key for a raw news record.
pub fn article_key(item: &Value) -> String {
    let article_id = field_text(item, &["article_id"]);
    if !article_id.is_empty() {
        return format!("id:{article_id}");
    }

    let link = field_text(item, &["link"]);
    if !link.is_empty() {
        return format!("link:{link}");
    }

    let title = field_text(item, &["title"]);
    let pub_date = field_text(item, &["pubDate", "published_at"]);
    let source = field_text(item, &["source_id", "source_name"]);
    format!("fallback:{title}|{pub_date}|{source}")
}

/// Short stable id for a digest item: 12 hex chars of
/// `sha256("{source_id}:{link or title}")`.
pub fn digest_item_id(source_id: Option<&str>, link: &str, title: &str) -> String {
    let base = if link.trim().is_empty() { title } else { link };
    let seed = format!("{}:{}", source_id.unwrap_or("None"), base.trim());
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    digest[..12].to_string()
}

/// Key for the within-run cross-feed dedupe: link, else title, else id.
pub fn run_dedupe_key(item: &DigestItem) -> &str {
    [item.link.as_str(), item.title.as_str()]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or(item.id.as_str())
}

/// The first present value among `names`, rendered and trimmed, or `""`.
///
/// Presence is decided before trimming, so a whitespace-only field still
/// wins over the alternates and renders as empty.
fn field_text(item: &Value, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| item.get(*name))
        .find(|v| is_truthy(v))
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}
