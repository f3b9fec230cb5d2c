//! Error taxonomy shared by both pipelines.
//!
//! Every fallible function in the crate returns [`Result<T>`]. Whether an
//! error is fatal depends on where it surfaces: the news pipeline aborts on
//! anything, while the digest pipeline downgrades [`IngestError::Upstream`]
//! and [`IngestError::FeedParse`] raised by a single feed into a recorded
//! per-feed error and moves on.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    /// No API key could be resolved from flags, environment, or env files.
    #[error("Missing {key}. Set it in the environment or a .env file.")]
    CredentialMissing { key: String },

    /// The file exists but could not be read or is not valid JSON.
    #[error("Failed to read or parse {}: {reason}", path.display())]
    InputCorrupt { path: PathBuf, reason: String },

    /// The file is valid JSON but has a shape we cannot use.
    #[error("Unexpected JSON format in {}: {reason}", path.display())]
    Schema { path: PathBuf, reason: String },

    #[error("API error: {0}")]
    Upstream(String),

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("Summarization response error: {0}")]
    ResponseFormat(String),

    #[error("No feeds selected; check catalog or filters.")]
    NoFeedsSelected,

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InputCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Schema {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that only affect a single feed in the digest run.
    pub fn is_feed_scoped(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::FeedParse(_) | Self::Http(_)
        )
    }
}
