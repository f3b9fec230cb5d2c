//! NewsData.io latest-news client.
//!
//! Issues a single `GET /api/1/news` with the API key and filters in the
//! query string and returns the decoded response envelope. Envelope status
//! is left for the caller to judge; only transport and HTTP-level failures
//! are reported here.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{error, info, instrument};
use url::Url;

use crate::error::{IngestError, Result};
use crate::models::{NewsPage, QueryParams};
use crate::sources::NewsSource;
use crate::utils::truncate_for_log;

pub const NEWSDATA_ENDPOINT: &str = "https://newsdata.io/api/1/news";
pub const NEWSDATA_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct NewsDataClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl NewsDataClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_endpoint(api_key, NEWSDATA_ENDPOINT, NEWSDATA_TIMEOUT)
    }

    pub fn with_endpoint(api_key: String, endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| IngestError::Upstream(format!("invalid endpoint {endpoint}: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Full request URL for `params`. `q` and `page` are only sent when set.
    pub fn request_url(&self, params: &QueryParams) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("apikey", &self.api_key)
                .append_pair("category", &params.category)
                .append_pair("country", &params.country)
                .append_pair("language", &params.language)
                .append_pair("size", &params.size.to_string());
            if let Some(query) = params.query.as_deref() {
                q.append_pair("q", query);
            }
            if let Some(page) = params.page.as_deref() {
                q.append_pair("page", page);
            }
        }
        url
    }
}

impl NewsSource for NewsDataClient {
    #[instrument(level = "info", skip_all, fields(category = %params.category, country = %params.country))]
    async fn fetch_page(&self, params: &QueryParams) -> Result<NewsPage> {
        let t0 = Instant::now();
        let response = self.client.get(self.request_url(params)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        let elapsed_ms = t0.elapsed().as_millis() as u64;

        if !status.is_success() {
            error!(%status, elapsed_ms, body = %truncate_for_log(&body, 300), "NewsData returned HTTP error");
            return Err(http_failure(status.as_u16(), &body));
        }

        let page: NewsPage = serde_json::from_str(&body)?;
        info!(
            elapsed_ms,
            status = page.status.as_deref().unwrap_or("<none>"),
            results = page.results.as_array().map_or(0, Vec::len),
            "NewsData page received"
        );
        Ok(page)
    }
}

/// Prefer the API's own error envelope when the body carries one.
fn http_failure(status: u16, body: &str) -> IngestError {
    match serde_json::from_str::<NewsPage>(body) {
        Ok(page) if page.status.is_some() => {
            IngestError::Upstream(format!("HTTP {status}: {}", page.error_message()))
        }
        _ => IngestError::Upstream(format!("HTTP {status}: {}", truncate_for_log(body, 200))),
    }
}
