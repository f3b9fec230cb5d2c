//! LLM summarization of digest items.
//!
//! All items of a run are sent in one chat-completion request; the model is
//! asked to answer with a JSON object `{"items": [{"id", "summary", "tags"}]}`.
//! Answers are matched back to items by id. Items the model skipped are left
//! as they were, while a failed call or an unparseable answer fails the run.
//!
//! # Architecture
//!
//! - [`AskAsync`]: one system + user prompt in, one completion out
//! - [`OpenAiClient`]: [`AskAsync`] over the OpenAI chat-completions endpoint
//! - [`summarize_items`]: builds the batch prompt, parses the reply and
//!   applies it to the items

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestError, Result};
use crate::models::{DigestItem, SummaryMeta};
use crate::outputs::json::to_ascii_compact;
use crate::utils::{extract_json_object, looks_truncated, truncate_for_log};

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You summarize news items. For each item, return a short summary \
    (max 1 sentence) and 3-6 topical tags. Use neutral language.";

const USER_INSTRUCTIONS: &str = "Return JSON with an 'items' array. Each array item must include: \
    id, summary, tags (array of short strings). Only return JSON.";

/// A single model completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub id: Option<String>,
    pub content: String,
    pub usage: Option<Value>,
}

/// Trait for async LLM interaction.
///
/// Implementors send one system/user prompt pair and return the model's
/// text. Tests substitute canned implementations.
pub trait AskAsync {
    async fn ask(&self, system: &str, user: &str) -> Result<Completion>;

    /// Model identifier recorded in the output document.
    fn model(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat-completions client with bearer-token auth.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            model,
            endpoint: OPENAI_ENDPOINT.to_string(),
        })
    }
}

impl AskAsync for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, system: &str, user: &str) -> Result<Completion> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %truncate_for_log(&body, 300), "Completion request failed");
            return Err(IngestError::Upstream(format!(
                "OpenAI HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            chars = content.len(),
            "Completion received"
        );
        Ok(Completion {
            id: parsed.id,
            content,
            usage: parsed.usage,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct PromptItem<'a> {
    id: &'a str,
    title: &'a str,
    source: Option<&'a str>,
    published: &'a str,
    summary: &'a str,
    link: &'a str,
}

#[derive(Debug, Serialize)]
struct PromptPayload<'a> {
    items: Vec<PromptItem<'a>>,
}

/// The user message: instructions followed by the batch as ASCII JSON.
pub fn build_user_prompt(items: &[DigestItem]) -> Result<String> {
    let payload = PromptPayload {
        items: items
            .iter()
            .map(|item| PromptItem {
                id: &item.id,
                title: &item.title,
                source: item.source_name.as_deref(),
                published: &item.published,
                summary: &item.summary,
                link: &item.link,
            })
            .collect(),
    };
    Ok(format!("{USER_INSTRUCTIONS}\n{}", to_ascii_compact(&payload)?))
}

/// The model's answer for one item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryEntry {
    pub id: String,
    /// Passed through as the model wrote it; `Null` when absent.
    pub summary: Value,
    pub tags: Vec<String>,
}

impl SummaryEntry {
    /// Read one element of the reply's `items` array. Elements that are not
    /// objects, or whose `id` is not a non-empty string, cannot be matched to
    /// an item and yield `None`.
    fn from_value(value: &Value) -> Option<Self> {
        let id = value.get("id")?.as_str().filter(|id| !id.is_empty())?;
        Some(Self {
            id: id.to_string(),
            summary: value.get("summary").cloned().unwrap_or(Value::Null),
            tags: value.get("tags").map(coerce_tags).unwrap_or_default(),
        })
    }
}

/// Tags as a list of strings. A comma-separated string is split, scalars in
/// a list are rendered as text, and anything else means no tags.
fn coerce_tags(value: &Value) -> Vec<String> {
    let parts: Vec<String> = match value {
        Value::Array(values) => values
            .iter()
            .filter_map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    parts
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryBatch {
    pub items: Vec<SummaryEntry>,
}

/// Pull the JSON object out of a completion and decode it.
///
/// Only malformed JSON is an error. A missing or non-list `items` field is
/// an empty batch, and entries that cannot be matched are dropped.
pub fn parse_reply(content: &str) -> Result<SummaryBatch> {
    let raw = extract_json_object(content)
        .ok_or_else(|| IngestError::ResponseFormat("model returned empty content".to_string()))?;
    let reply: Value = serde_json::from_str(raw).map_err(|e| {
        let hint = if looks_truncated(&e) { " (response looks truncated)" } else { "" };
        IngestError::ResponseFormat(format!("failed to parse model JSON{hint}: {e}"))
    })?;

    let entries = reply.get("items").and_then(Value::as_array);
    let items: Vec<SummaryEntry> = entries
        .into_iter()
        .flatten()
        .filter_map(SummaryEntry::from_value)
        .collect();
    let dropped = entries.map_or(0, |e| e.len()) - items.len();
    if dropped > 0 {
        debug!(dropped, "Ignoring reply entries without a usable id");
    }
    Ok(SummaryBatch { items })
}

/// Attach summaries and tags to the items the batch covers. Returns how
/// many items were augmented.
pub fn apply_summaries(items: &mut [DigestItem], batch: SummaryBatch) -> usize {
    let by_id: HashMap<String, SummaryEntry> = batch
        .items
        .into_iter()
        .map(|entry| (entry.id.clone(), entry))
        .collect();

    let mut augmented = 0;
    for item in items.iter_mut() {
        if let Some(entry) = by_id.get(&item.id) {
            item.ai_summary = Some(entry.summary.clone());
            item.ai_tags = Some(entry.tags.clone());
            augmented += 1;
        }
    }
    augmented
}

/// Summarize `items` in one batched call and apply the results in place.
///
/// # Arguments
///
/// * `api` - The completion client
/// * `items` - Digest items; covered ones gain `ai_summary` and `ai_tags`
///
/// # Returns
///
/// The model name, response id and token usage for the snapshot's `openai`
/// block.
///
/// # Errors
///
/// Fails when the call fails or the reply is not a JSON object. Items are
/// left untouched in that case.
#[instrument(level = "info", skip_all, fields(items = items.len(), model = %api.model()))]
pub async fn summarize_items<A: AskAsync>(api: &A, items: &mut [DigestItem]) -> Result<SummaryMeta> {
    let user = build_user_prompt(items)?;
    let completion = api.ask(SYSTEM_PROMPT, &user).await?;

    let batch = parse_reply(&completion.content).inspect_err(|e| {
        warn!(
            error = %e,
            response_preview = %truncate_for_log(&completion.content, 300),
            "Model returned non-conforming JSON"
        );
    })?;

    let augmented = apply_summaries(items, batch);
    info!(augmented, total = items.len(), "Applied summaries");

    Ok(SummaryMeta {
        model: api.model().to_string(),
        response_id: completion.id,
        usage: completion.usage,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    pub(crate) fn item(id: &str, title: &str) -> DigestItem {
        DigestItem {
            id: id.to_string(),
            title: title.to_string(),
            link: format!("https://example.com/{id}"),
            summary: "Feed summary".to_string(),
            published: "2025-05-06".to_string(),
            source_id: Some("ex".to_string()),
            source_name: Some("Example".to_string()),
            feed_name: None,
            feed_url: "https://example.com/rss".to_string(),
            topic_tags: vec![],
            fetched_at: None,
            ai_summary: None,
            ai_tags: None,
        }
    }

    /// Returns a canned completion and remembers the prompt it was given.
    pub(crate) struct CannedAsk {
        pub reply: String,
        pub seen_user: RefCell<Option<String>>,
    }

    impl CannedAsk {
        pub(crate) fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen_user: RefCell::new(None),
            }
        }
    }

    impl AskAsync for CannedAsk {
        async fn ask(&self, _system: &str, user: &str) -> Result<Completion> {
            *self.seen_user.borrow_mut() = Some(user.to_string());
            Ok(Completion {
                id: Some("chatcmpl-test".to_string()),
                content: self.reply.clone(),
                usage: Some(json!({"total_tokens": 42})),
            })
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    #[test]
    fn test_user_prompt_embeds_ascii_payload() {
        let items = vec![item("a1", "Café opens")];
        let prompt = build_user_prompt(&items).unwrap();
        assert!(prompt.starts_with(USER_INSTRUCTIONS));
        assert!(prompt.is_ascii());
        assert!(prompt.contains("\"id\":\"a1\""));
        assert!(prompt.contains("\"source\":\"Example\""));
        assert!(prompt.contains("Caf\\u00e9"));
    }

    #[test]
    fn test_parse_reply_with_surrounding_text() {
        let batch = parse_reply("Here you go:\n{\"items\": [{\"id\": \"a\", \"summary\": \"s\", \"tags\": [\"x\"]}]}\nThanks")
            .unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].tags, vec!["x".to_string()]);
    }

    #[test]
    fn test_parse_reply_failures() {
        assert!(matches!(
            parse_reply("no braces").unwrap_err(),
            IngestError::ResponseFormat(_)
        ));
        assert!(matches!(
            parse_reply("{\"items\": [ }").unwrap_err(),
            IngestError::ResponseFormat(_)
        ));
    }

    #[test]
    fn test_apply_summaries_partial_coverage() {
        let mut items = vec![item("a", "A"), item("b", "B"), item("c", "C")];
        let batch = parse_reply(
            r#"{"items": [
                {"id": "a", "summary": "About A.", "tags": ["x", "y"]},
                {"id": "c", "summary": "About C."},
                {"id": "zzz", "summary": "Unknown item"},
                {"summary": "No id"}
            ]}"#,
        )
        .unwrap();

        let n = apply_summaries(&mut items, batch);
        assert_eq!(n, 2);
        assert_eq!(items[0].ai_summary, Some(json!("About A.")));
        assert_eq!(items[0].ai_tags, Some(vec!["x".to_string(), "y".to_string()]));
        assert_eq!(items[1].ai_summary, None);
        assert_eq!(items[1].ai_tags, None);
        assert_eq!(items[2].ai_summary, Some(json!("About C.")));
        assert_eq!(items[2].ai_tags, Some(vec![]));
    }

    #[test]
    fn test_mixed_type_reply_is_not_fatal() {
        let mut items = vec![item("a", "A"), item("b", "B"), item("7", "Seven")];
        let batch = parse_reply(
            r#"{"items": [
                {"id": "a", "summary": "About A.", "tags": "x, y ,"},
                {"id": "b", "tags": ["econ", 2025, null, true]},
                {"id": 7, "summary": "Numeric id"},
                {"id": "", "summary": "Empty id"},
                "stray",
                {"id": "zzz", "summary": "Unknown", "tags": {"k": "v"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(batch.items.len(), 3);
        assert!(batch.items[2].tags.is_empty());

        assert_eq!(apply_summaries(&mut items, batch), 2);
        assert_eq!(items[0].ai_tags, Some(vec!["x".to_string(), "y".to_string()]));
        assert_eq!(items[1].ai_summary, Some(Value::Null));
        assert_eq!(
            items[1].ai_tags,
            Some(vec!["econ".to_string(), "2025".to_string(), "true".to_string()])
        );
        assert!(items[2].ai_summary.is_none());
    }

    #[test]
    fn test_reply_without_items_list_is_empty() {
        assert!(parse_reply(r#"{"items": "none"}"#).unwrap().items.is_empty());
        assert!(parse_reply(r#"{"summary": "x"}"#).unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_summarize_items_records_meta() {
        let api = CannedAsk::new(r#"{"items": [{"id": "a", "summary": "S", "tags": ["t"]}]}"#);
        let mut items = vec![item("a", "A"), item("b", "B")];

        let meta = summarize_items(&api, &mut items).await.unwrap();
        assert_eq!(meta.model, "test-model");
        assert_eq!(meta.response_id.as_deref(), Some("chatcmpl-test"));
        assert_eq!(meta.usage, Some(json!({"total_tokens": 42})));
        assert!(api.seen_user.borrow().as_ref().unwrap().contains("\"id\":\"b\""));
        assert_eq!(items[0].ai_summary, Some(json!("S")));
        assert!(items[1].ai_summary.is_none());
    }

    #[tokio::test]
    async fn test_summarize_items_bad_reply_is_fatal() {
        let api = CannedAsk::new("I cannot help with that.");
        let mut items = vec![item("a", "A")];
        let err = summarize_items(&api, &mut items).await.unwrap_err();
        assert!(matches!(err, IngestError::ResponseFormat(_)));
        assert!(items[0].ai_summary.is_none());
    }
}
