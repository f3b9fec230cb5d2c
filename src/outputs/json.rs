//! Reproducible JSON output.
//!
//! Documents are written with two-space indentation, every non-ASCII
//! character escaped as `\uXXXX` (surrogate pairs above the BMP), and a
//! trailing newline, so consecutive runs diff cleanly.
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── newsdata_dump.json               # news store (rewritten each run)
//! ├── rss_openai_daily.json            # latest digest snapshot
//! └── history/
//!     └── rss_openai_daily_2025-05-06.json
//! ```

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter, Serializer};
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::utils::date_stamp;

/// Wraps another [`Formatter`] and additionally escapes non-ASCII characters.
struct AsciiEscaped<F> {
    inner: F,
}

impl<F: Formatter> Formatter for AsciiEscaped<F> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}

fn serialize_with<T, F>(value: &T, formatter: F) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
    F: Formatter,
{
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, AsciiEscaped { inner: formatter });
    value.serialize(&mut ser)?;
    Ok(buf)
}

/// Serialize `value` as indented, ASCII-only JSON followed by a newline.
pub fn to_ascii_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = serialize_with(value, PrettyFormatter::with_indent(b"  "))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Serialize `value` as single-line, ASCII-only JSON.
pub fn to_ascii_compact<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let buf = serialize_with(value, CompactFormatter)?;
    // Every byte is ASCII at this point.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write `value` to `path`, creating parent directories as needed.
///
/// The file is overwritten in place.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_document<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let bytes = to_ascii_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    fs::write(path, &bytes).await?;
    info!(bytes = bytes.len(), "Wrote JSON document");
    Ok(())
}

/// Dated archive location for a snapshot: `{archive_dir}/{stem}_{YYYY-MM-DD}.json`.
pub fn archive_path(archive_dir: &Path, output: &Path, generated_at: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    archive_dir.join(format!("{}_{}.json", stem, date_stamp(generated_at)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_non_ascii_is_escaped() {
        let out = to_ascii_pretty(&json!({"title": "Café — 🚀"})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.is_ascii());
        assert!(text.contains("Caf\\u00e9 \\u2014 \\ud83d\\ude80"));
    }

    #[test]
    fn test_compact_is_single_line_ascii() {
        let out = to_ascii_compact(&json!({"items": [{"title": "Zürich"}]})).unwrap();
        assert_eq!(out, "{\"items\":[{\"title\":\"Z\\u00fcrich\"}]}");
    }

    #[test]
    fn test_layout_is_two_space_indented_with_newline() {
        let out = to_ascii_pretty(&json!({"a": [1], "b": []})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    1\n  ],\n  \"b\": []\n}\n");
    }

    #[test]
    fn test_escaped_output_round_trips() {
        let value = json!({"k": "naïve \"quoted\"\n日本"});
        let out = to_ascii_pretty(&value).unwrap();
        let back: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_field_order_is_preserved() {
        let value: serde_json::Value = serde_json::from_str(r#"{"z": 1, "a": 2}"#).unwrap();
        let text = String::from_utf8(to_ascii_pretty(&value).unwrap()).unwrap();
        assert!(text.find("\"z\"").unwrap() < text.find("\"a\"").unwrap());
    }

    #[tokio::test]
    async fn test_write_document_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("out.json");
        write_document(&json!({"ok": true}), &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"ok\": true\n}\n");
    }

    #[test]
    fn test_archive_path() {
        let p = archive_path(
            Path::new("data/history"),
            Path::new("data/rss_openai_daily.json"),
            "2025-05-06T14:30:00Z",
        );
        assert_eq!(p, Path::new("data/history/rss_openai_daily_2025-05-06.json"));
    }
}
