//! Upstream collaborators the pipelines fetch from.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | NewsData.io | [`newsdata`] | JSON API | One GET per run, query-string API key |
//! | RSS / Atom feeds | [`rss`] | HTTP + [`feed`] parser | One GET per catalog feed |
//!
//! Each network collaborator sits behind a trait so the pipelines can be
//! driven by in-memory fakes in tests. Exactly one attempt is made per call;
//! there is no retry.

pub mod feed;
pub mod newsdata;
pub mod rss;

use crate::error::Result;
use crate::models::{NewsPage, QueryParams};

/// Something that can return one page of news records.
pub trait NewsSource {
    async fn fetch_page(&self, params: &QueryParams) -> Result<NewsPage>;
}

/// Something that can return the raw body of a syndication feed.
pub trait FeedSource {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<u8>>;
}
