//! News pipeline: one NewsData page merged into the JSON store.

use std::path::PathBuf;

use tracing::{error, info, instrument};

use crate::error::{IngestError, Result};
use crate::models::QueryParams;
use crate::outputs::json::write_document;
use crate::sources::NewsSource;
use crate::store::{MergeOutcome, load_store};
use crate::utils::utc_now;

#[derive(Debug, Clone)]
pub struct NewsSettings {
    pub params: QueryParams,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsReport {
    pub outcome: MergeOutcome,
    pub total_articles: usize,
    pub output: PathBuf,
}

/// Load the store, fetch one page, merge it and write the store back.
///
/// The store is loaded before any network call so a corrupt file aborts
/// the run without spending a request. Any failure leaves the file as it was.
#[instrument(level = "info", skip_all, fields(output = %settings.output.display()))]
pub async fn run<S: NewsSource>(source: &S, settings: &NewsSettings) -> Result<NewsReport> {
    let mut store = load_store(&settings.output)?;

    let page = source.fetch_page(&settings.params).await?;
    if !page.is_success() {
        let message = page.error_message();
        error!(%message, "NewsData reported an error");
        return Err(IngestError::Upstream(message));
    }

    let fetched_at = utc_now();
    let outcome = store.merge_page(&page, &settings.params, &fetched_at)?;
    write_document(&store, &settings.output).await?;

    info!(
        added = outcome.added,
        skipped = outcome.skipped,
        total = store.articles.len(),
        "News store updated"
    );
    Ok(NewsReport {
        outcome,
        total_articles: store.articles.len(),
        output: settings.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::article_key;
    use crate::models::NewsPage;
    use serde_json::{Value, json};
    use std::cell::Cell;
    use tempfile::tempdir;

    struct CannedNews {
        page: Value,
        calls: Cell<usize>,
    }

    impl CannedNews {
        fn new(page: Value) -> Self {
            Self {
                page,
                calls: Cell::new(0),
            }
        }
    }

    impl NewsSource for CannedNews {
        async fn fetch_page(&self, _params: &QueryParams) -> Result<NewsPage> {
            self.calls.set(self.calls.get() + 1);
            Ok(serde_json::from_value(self.page.clone())?)
        }
    }

    fn settings(output: PathBuf) -> NewsSettings {
        NewsSettings {
            params: QueryParams {
                query: Some("markets".to_string()),
                category: "business".to_string(),
                country: "us".to_string(),
                language: "en".to_string(),
                size: 2,
                page: None,
            },
            output,
        }
    }

    fn read(path: &std::path::Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_merge_scenario_42_43() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("data").join("newsdata_dump.json");
        std::fs::create_dir_all(output.parent().unwrap()).unwrap();
        std::fs::write(
            &output,
            r#"{"schema_version": "1.0", "updated_at": null, "articles": [{"article_id": "42", "title": "Known"}], "requests": []}"#,
        )
        .unwrap();

        let source = CannedNews::new(json!({
            "status": "success",
            "totalResults": 2,
            "results": [
                {"article_id": "42", "title": "Known"},
                {"article_id": "43", "title": "Fresh"}
            ],
            "nextPage": "next-1"
        }));

        let report = run(&source, &settings(output.clone())).await.unwrap();
        assert_eq!(report.outcome, MergeOutcome { added: 1, skipped: 1 });
        assert_eq!(report.total_articles, 2);

        let doc = read(&output);
        let keys: Vec<String> = doc["articles"]
            .as_array()
            .unwrap()
            .iter()
            .map(article_key)
            .collect();
        assert_eq!(keys, vec!["id:42", "id:43"]);
        assert_eq!(doc["articles"][1]["query_params"]["query"], json!("markets"));
        assert_eq!(doc["requests"].as_array().unwrap().len(), 1);
        assert_eq!(doc["requests"][0]["added"], json!(1));
        assert_eq!(doc["requests"][0]["skipped"], json!(1));
        assert_eq!(doc["requests"][0]["total_results"], json!(2));
        assert!(doc["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_second_run_adds_nothing() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("dump.json");
        let source = CannedNews::new(json!({
            "status": "success",
            "totalResults": 3,
            "results": [{"article_id": "1"}, {"link": "https://x.test/2"}, {"title": "t"}]
        }));

        let first = run(&source, &settings(output.clone())).await.unwrap();
        let second = run(&source, &settings(output.clone())).await.unwrap();

        assert_eq!(first.outcome.added, 3);
        assert_eq!(second.outcome, MergeOutcome { added: 0, skipped: 3 });
        let doc = read(&output);
        assert_eq!(doc["articles"].as_array().unwrap().len(), 3);
        assert_eq!(doc["requests"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_store_aborts_before_fetch() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("dump.json");
        std::fs::write(&output, "{ truncated").unwrap();
        let source = CannedNews::new(json!({"status": "success", "results": []}));

        let err = run(&source, &settings(output.clone())).await.unwrap_err();
        assert!(matches!(err, IngestError::InputCorrupt { .. }));
        assert_eq!(source.calls.get(), 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "{ truncated");
    }

    #[tokio::test]
    async fn test_upstream_error_writes_nothing() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("dump.json");
        let source = CannedNews::new(json!({"status": "error", "results": {"message": "bad key"}}));

        let err = run(&source, &settings(output.clone())).await.unwrap_err();
        assert!(matches!(err, IngestError::Upstream(ref m) if m.contains("bad key")));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_legacy_store_is_upgraded_on_write() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("dump.json");
        std::fs::write(&output, r#"[{"article_id": "1"}]"#).unwrap();
        let source = CannedNews::new(json!({"status": "success", "results": [{"article_id": "1"}]}));

        let report = run(&source, &settings(output.clone())).await.unwrap();
        assert_eq!(report.outcome, MergeOutcome { added: 0, skipped: 1 });
        let doc = read(&output);
        assert_eq!(doc["schema_version"], json!("1.0"));
        assert_eq!(doc["articles"].as_array().unwrap().len(), 1);
        assert_eq!(doc["requests"].as_array().unwrap().len(), 1);
    }
}
