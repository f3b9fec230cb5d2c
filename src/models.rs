//! Data models for both pipelines.
//!
//! News records are kept as raw [`serde_json::Value`]s because the upstream
//! API is open-ended and normalization only ever adds fields. Digest items
//! are built locally, so they get a concrete struct.
//!
//! - [`QueryParams`] / [`RequestAudit`]: what was asked for and what came back
//! - [`NewsPage`]: one response envelope from the news API
//! - [`Catalog`] / [`FeedSelection`]: the RSS feed catalog and the feeds picked from it
//! - [`DigestItem`] / [`DigestSnapshot`]: the digest pipeline's output document

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::is_truthy;

/// Parameters of one news API call, recorded on every appended article and
/// in the request audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub query: Option<String>,
    pub category: String,
    pub country: String,
    pub language: String,
    pub size: u32,
    pub page: Option<String>,
}

/// Immutable log entry describing one fetch and its merge outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAudit {
    pub fetched_at: String,
    pub params: QueryParams,
    pub status: Option<String>,
    pub total_results: Option<Value>,
    pub results_count: usize,
    pub next_page: Option<Value>,
    pub added: usize,
    pub skipped: usize,
}

/// Response envelope returned by the news API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsPage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "totalResults")]
    pub total_results: Option<Value>,
    #[serde(default)]
    pub results: Value,
    #[serde(default, rename = "nextPage")]
    pub next_page: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl NewsPage {
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }

    /// The records carried by a successful page. A missing or non-list
    /// `results` field yields nothing.
    pub fn items(&self) -> Vec<Value> {
        self.results.as_array().cloned().unwrap_or_default()
    }

    /// Diagnostic text for a non-success page: `message`, else `results`,
    /// else a generic fallback.
    pub fn error_message(&self) -> String {
        [self.message.as_ref(), Some(&self.results)]
            .into_iter()
            .flatten()
            .find(|v| is_truthy(v))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "Unknown error".to_string())
    }
}

/// The RSS feed catalog on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sources: Option<Vec<CatalogSource>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub feeds: Option<Vec<CatalogFeed>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFeed {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub topic_tags: Option<Vec<String>>,
}

/// One feed chosen for this run, flattened with its owning source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSelection {
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub feed_name: Option<String>,
    pub feed_url: String,
    pub topic_tags: Vec<String>,
}

/// A normalized feed entry in the digest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: String,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub feed_name: Option<String>,
    pub feed_url: String,
    pub topic_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<String>,
    /// The model's summary as it answered it. `Some(Value::Null)` when the
    /// reply covered the item without a summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_tags: Option<Vec<String>>,
}

/// A feed that failed during the digest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedError {
    pub feed_url: String,
    pub source_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRequest {
    pub max_sources: usize,
    pub feeds_per_source: usize,
    pub max_items_per_feed: usize,
    pub source_ids: Vec<String>,
}

/// Bookkeeping about the summarization call, present only when it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMeta {
    pub model: String,
    pub response_id: Option<String>,
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestSnapshot {
    pub schema_version: String,
    pub generated_at: String,
    pub catalog_path: String,
    pub request: DigestRequest,
    pub openai: Option<SummaryMeta>,
    pub items: Vec<DigestItem>,
    pub errors: Vec<FeedError>,
}
