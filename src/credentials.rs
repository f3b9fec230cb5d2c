//! API key and model lookup.
//!
//! Values are resolved from the process environment first, then from each
//! configured env file in order. Env file values are taken as written: no
//! variable expansion and no inline comments, only surrounding quotes are
//! removed. The process environment is never modified.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{IngestError, Result};

/// Ordered lookup chain for one process run.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    env_files: Vec<PathBuf>,
}

impl Credentials {
    pub fn new(env_files: Vec<PathBuf>) -> Self {
        Self { env_files }
    }

    /// Resolve `key`, preferring a non-empty `explicit` value, then the
    /// environment, then the env files.
    pub fn lookup(&self, key: &str, explicit: Option<&str>) -> Option<String> {
        if let Some(v) = non_empty(explicit) {
            return Some(v);
        }
        if let Some(v) = non_empty(std::env::var(key).ok().as_deref()) {
            debug!(key, "Resolved from environment");
            return Some(v);
        }
        self.env_files.iter().find_map(|path| {
            let v = read_env_file(path, key)?;
            debug!(key, path = %path.display(), "Resolved from env file");
            Some(v)
        })
    }

    /// Like [`Credentials::lookup`] but a missing value is an error.
    pub fn require(&self, key: &str, explicit: Option<&str>) -> Result<String> {
        self.lookup(key, explicit)
            .ok_or_else(|| IngestError::CredentialMissing {
                key: key.to_string(),
            })
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Scan one env file for `key`. Unreadable files count as "no value".
pub fn read_env_file(path: &Path, key: &str) -> Option<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if path.exists() {
                warn!(path = %path.display(), error = %e, "Could not read env file");
            }
            return None;
        }
    };
    parse_env(&content, key)
}

/// `KEY=value` lines; blank lines, `#` comments and lines without `=` are
/// skipped. The first line naming `key` decides, and an empty value there
/// means the file has none.
fn parse_env(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(name, _)| name.trim() == key)
        .map(|(_, value)| value.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_env_basic() {
        let content = "# comment\n\nOTHER=1\nNEWSDATA_API_KEY=\"pub_123\"\n";
        assert_eq!(
            parse_env(content, "NEWSDATA_API_KEY").as_deref(),
            Some("pub_123")
        );
    }

    #[test]
    fn test_parse_env_single_quotes_and_equals_in_value() {
        let content = "OPENAI_API_KEY='sk-a=b'\n";
        assert_eq!(
            parse_env(content, "OPENAI_API_KEY").as_deref(),
            Some("sk-a=b")
        );
    }

    #[test]
    fn test_parse_env_skips_noise() {
        let content = "not an assignment\n#KEY=commented\n=novalue\nKEY=\n";
        assert_eq!(parse_env(content, "KEY"), None);
    }

    #[test]
    fn test_parse_env_keeps_dollar_and_hash() {
        let content = "export_ignored\nOPENAI_API_KEY=sk-ab$cd\nNEWSDATA_API_KEY=abc #x\n";
        assert_eq!(
            parse_env(content, "OPENAI_API_KEY").as_deref(),
            Some("sk-ab$cd")
        );
        assert_eq!(
            parse_env(content, "NEWSDATA_API_KEY").as_deref(),
            Some("abc #x")
        );
        assert_eq!(
            parse_env("  KEY = \"${HOME}\"  \n", "KEY").as_deref(),
            Some("${HOME}")
        );
    }

    #[test]
    fn test_parse_env_first_match_wins() {
        let content = "KEY=one\nKEY=two\n";
        assert_eq!(parse_env(content, "KEY").as_deref(), Some("one"));
    }

    #[test]
    fn test_lookup_explicit_then_files() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("missing.env");
        let second = dir.path().join(".env");
        std::fs::write(&second, "NEWSDIGEST_TEST_ONLY_KEY=from-file\n").unwrap();

        let creds = Credentials::new(vec![first, second]);
        assert_eq!(
            creds.lookup("NEWSDIGEST_TEST_ONLY_KEY", Some("flag")).as_deref(),
            Some("flag")
        );
        assert_eq!(
            creds.lookup("NEWSDIGEST_TEST_ONLY_KEY", Some("  ")).as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn test_require_reports_missing_key() {
        let creds = Credentials::new(vec![]);
        let err = creds
            .require("NEWSDIGEST_TEST_ABSENT_KEY", None)
            .unwrap_err();
        assert!(matches!(err, IngestError::CredentialMissing { ref key } if key == "NEWSDIGEST_TEST_ABSENT_KEY"));
    }
}
