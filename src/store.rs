//! The on-disk article store and its idempotent merge.
//!
//! The store is read whole at start, grown by in-memory append, and written
//! whole at the end. Two top-level shapes are accepted on load:
//!
//! ```text
//! [ {...}, {...} ]                        legacy: bare list of articles
//! { "schema_version": "1.0",              current
//!   "updated_at": "...",
//!   "articles": [...],
//!   "requests": [...] }
//! ```
//!
//! Invariant: no two entries of `articles` share an identity key
//! (see [`crate::identity::article_key`]).

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::error::{IngestError, Result};
use crate::identity::article_key;
use crate::models::{NewsPage, QueryParams, RequestAudit};

pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default = "default_schema_version")]
    pub schema_version: Value,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub articles: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_seq")]
    pub requests: Vec<Value>,
    /// Unknown top-level fields, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            updated_at: None,
            articles: Vec::new(),
            requests: Vec::new(),
            extra: Map::new(),
        }
    }
}

fn default_schema_version() -> Value {
    Value::String(SCHEMA_VERSION.to_string())
}

/// Sequences that are present but not lists are reset to empty.
fn lenient_seq<'de, D>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// The two top-level document shapes a store file may have.
#[derive(Debug)]
pub enum StoreShape {
    Legacy(Vec<Value>),
    Current(Store),
}

impl StoreShape {
    /// Classify an already-parsed document. Anything other than a list or an
    /// object is a schema error.
    pub fn decode(path: &Path, doc: Value) -> Result<Self> {
        match doc {
            Value::Array(items) => Ok(Self::Legacy(items)),
            obj @ Value::Object(_) => serde_json::from_value(obj)
                .map(Self::Current)
                .map_err(|e| IngestError::schema(path, e)),
            other => Err(IngestError::schema(
                path,
                format!("expected an object or a list, found {}", json_kind(&other)),
            )),
        }
    }

    pub fn into_store(self) -> Store {
        match self {
            Self::Legacy(articles) => Store {
                articles,
                ..Store::default()
            },
            Self::Current(store) => store,
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Load the store at `path`.
///
/// A missing or blank file yields an empty store. A bare JSON list from
/// older versions is upgraded to the current document.
///
/// # Arguments
///
/// * `path` - Store file to read
///
/// # Returns
///
/// The store ready for merging, with unknown top-level fields kept.
///
/// # Errors
///
/// Unreadable files and invalid JSON are [`IngestError::InputCorrupt`];
/// valid JSON of the wrong shape is [`IngestError::Schema`].
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_store(path: &Path) -> Result<Store> {
    if !path.exists() {
        info!("Store file absent; starting empty");
        return Ok(Store::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| IngestError::corrupt(path, e))?;
    if content.trim().is_empty() {
        info!("Store file empty; starting empty");
        return Ok(Store::default());
    }

    let doc: Value =
        serde_json::from_str(content.trim()).map_err(|e| IngestError::corrupt(path, e))?;
    let shape = StoreShape::decode(path, doc)?;
    if matches!(shape, StoreShape::Legacy(_)) {
        info!("Upgrading legacy list-shaped store");
    }

    let store = shape.into_store();
    debug!(
        articles = store.articles.len(),
        requests = store.requests.len(),
        "Loaded store"
    );
    Ok(store)
}

/// Counters produced by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub skipped: usize,
}

impl Store {
    /// Append every record of `page` whose identity key is unseen, then
    /// record one request-audit entry and bump `updated_at`.
    ///
    /// Records are processed in the order the API returned them. Appended
    /// object records are stamped with `fetched_at` and `query_params`.
    ///
    /// # Arguments
    ///
    /// * `page` - Successful response envelope to merge
    /// * `params` - Query that produced the page, recorded on records and audit
    /// * `fetched_at` - Timestamp shared by the stamps, the audit and `updated_at`
    ///
    /// # Returns
    ///
    /// How many records were added and how many were skipped as known.
    #[instrument(level = "info", skip_all, fields(incoming = page.results.as_array().map_or(0, Vec::len)))]
    pub fn merge_page(
        &mut self,
        page: &NewsPage,
        params: &QueryParams,
        fetched_at: &str,
    ) -> Result<MergeOutcome> {
        let mut seen: HashSet<String> = self.articles.iter().map(article_key).collect();
        let params_value = serde_json::to_value(params)?;
        let incoming = page.items();
        let results_count = incoming.len();
        let mut outcome = MergeOutcome::default();

        for mut item in incoming {
            let key = article_key(&item);
            if seen.contains(&key) {
                debug!(%key, "Skipping known article");
                outcome.skipped += 1;
                continue;
            }
            if let Value::Object(fields) = &mut item {
                fields.insert("fetched_at".to_string(), Value::String(fetched_at.to_string()));
                fields.insert("query_params".to_string(), params_value.clone());
            }
            self.articles.push(item);
            seen.insert(key);
            outcome.added += 1;
        }

        self.updated_at = Some(fetched_at.to_string());
        let audit = RequestAudit {
            fetched_at: fetched_at.to_string(),
            params: params.clone(),
            status: page.status.clone(),
            total_results: page.total_results.clone(),
            results_count,
            next_page: page.next_page.clone(),
            added: outcome.added,
            skipped: outcome.skipped,
        };
        self.requests.push(serde_json::to_value(audit)?);

        info!(added = outcome.added, skipped = outcome.skipped, "Merged page into store");
        Ok(outcome)
    }
}
