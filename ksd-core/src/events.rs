//! Knowledge event log reader
//!
//! The hot log is an append-only JSONL file, one event object per line.
//! Its schema has drifted over time, so the record type here is tolerant:
//!
//! - The timestamp lives under `ts` or the older `timestamp` key. Lines that
//!   carry both are accepted and `ts` wins.
//! - The primary text may be under `content`, `thought`, `observation` or
//!   `question`; [`Event::primary_text`] resolves them in that order.
//! - `tags` is normally a list but older writers stored a comma-separated
//!   string; both are accepted.
//! - Every field defaults when missing or `null`.
//!
//! # Reading strategies
//!
//! - [`read_all`] / [`EventReader`]: full sequential read in file order. A
//!   malformed line fails the whole read with [`Error::Parse`].
//! - [`tail_last_event`]: reads only the last [`DEFAULT_TAIL_WINDOW`] bytes to
//!   recover the newest event. The dashboard calls this on every refresh, so
//!   it never scans the whole file. Any failure, including a window that cut
//!   the last line in half, yields `None`.
//! - [`count_events`]: streaming count of non-blank lines.

use crate::error::{Error, Result};
use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes read from the end of the log by [`tail_last_event`].
pub const DEFAULT_TAIL_WINDOW: u64 = 1024;

/// Placeholder shown when an event carries no primary text.
pub const NO_CONTENT: &str = "No content";

/// One parsed line of the hot log.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Event {
    /// Timestamp as written by current producers (ISO-8601 expected, not enforced)
    pub ts: Option<String>,
    /// Timestamp key used by older producers
    pub timestamp: Option<String>,
    /// Short category tag (thought, observation, connection, ...)
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub event_type: String,
    pub content: Option<String>,
    /// Legacy payload keys
    pub thought: Option<String>,
    pub observation: Option<String>,
    pub question: Option<String>,
    pub topic: Option<String>,
    pub context: Option<String>,
    #[serde(deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// The source line, kept for diagnostic display
    #[serde(skip)]
    pub raw: String,
}

impl Event {
    /// Parse a single log line.
    pub fn parse(line: &str) -> std::result::Result<Self, serde_json::Error> {
        let line = line.trim();
        let mut event: Event = serde_json::from_str(line)?;
        event.raw = line.to_string();
        Ok(event)
    }

    /// The primary text of the event.
    ///
    /// Precedence is `content`, `thought`, `observation`, `question`; empty
    /// strings count as absent. Falls back to [`NO_CONTENT`].
    pub fn primary_text(&self) -> &str {
        [&self.content, &self.thought, &self.observation, &self.question]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|text| !text.is_empty())
            .unwrap_or(NO_CONTENT)
    }

    /// The raw timestamp, `ts` first, then `timestamp`; empty when neither is set.
    pub fn timestamp(&self) -> &str {
        [&self.ts, &self.timestamp]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|ts| !ts.is_empty())
            .unwrap_or("")
    }

    /// Timestamp formatted for display, see [`format_timestamp`].
    pub fn display_time(&self) -> String {
        format_timestamp(self.timestamp())
    }
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `["a", "b"]`, `"a, b"` or `null`.
fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<RawTags>::deserialize(deserializer)? {
        Some(RawTags::List(tags)) => tags,
        Some(RawTags::Joined(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    })
}

/// Format a stored timestamp as `YYYY-MM-DD HH:MM`.
///
/// The log format is not controlled by this reader, so anything that is not
/// RFC 3339 is returned unchanged.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Streaming reader over a JSONL event log.
///
/// Yields events in file order, skipping blank lines. After the first
/// error the iterator is fused.
pub struct EventReader {
    lines: std::io::Lines<BufReader<File>>,
    line_number: usize,
    failed: bool,
}

impl EventReader {
    /// Open the log at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("opening {}: {}", path.display(), e),
            ))
        })?;

        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_number: 0,
            failed: false,
        })
    }
}

impl Iterator for EventReader {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        for line in self.lines.by_ref() {
            self.line_number += 1;

            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(Error::Io(e)));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(Event::parse(&line).map_err(|e| {
                self.failed = true;
                Error::Parse {
                    line: self.line_number,
                    message: e.to_string(),
                }
            }));
        }

        None
    }
}

/// Read every event in the log, oldest first.
///
/// A single malformed line fails the whole read; there is no skip-and-continue.
pub fn read_all(path: &Path) -> Result<Vec<Event>> {
    EventReader::open(path)?.collect()
}

/// Return the newest event without reading the whole log.
pub fn tail_last_event(path: &Path) -> Option<Event> {
    tail_last_event_within(path, DEFAULT_TAIL_WINDOW)
}

/// Like [`tail_last_event`] with an explicit window size in bytes.
pub fn tail_last_event_within(path: &Path, window: u64) -> Option<Event> {
    match read_tail_line(path, window) {
        Ok(Some(line)) => match Event::parse(&line) {
            Ok(event) => Some(event),
            Err(e) => {
                // Expected when the window starts mid-line
                tracing::debug!(path = %path.display(), error = %e, "Tail line did not parse");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Tail read failed");
            None
        }
    }
}

/// Last non-blank line within the final `window` bytes, if any.
fn read_tail_line(path: &Path, window: u64) -> Result<Option<String>> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 || window == 0 {
        return Ok(None);
    }

    let len = window.min(size);
    file.seek(SeekFrom::Start(size - len))?;

    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;

    // The window may start inside a multi-byte character
    let text = String::from_utf8_lossy(&buf);

    Ok(text
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string))
}

/// Count events (non-blank lines) in the log.
///
/// A log that does not exist yet holds zero events.
pub fn count_events(path: &Path) -> Result<usize> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut count = 0;
    for line in BufReader::new(file).lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn log_with(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_current_schema() {
        let line = r#"{"ts":"2025-06-01T10:15:00Z","type":"thought","content":"Rust ownership","topic":"lang","tags":["rust","memory"],"metadata":{"source":"chat","depth":2}}"#;
        let event = Event::parse(line).unwrap();

        assert_eq!(event.timestamp(), "2025-06-01T10:15:00Z");
        assert_eq!(event.event_type, "thought");
        assert_eq!(event.primary_text(), "Rust ownership");
        assert_eq!(event.topic.as_deref(), Some("lang"));
        assert_eq!(event.tags, vec!["rust", "memory"]);
        assert_eq!(event.metadata["depth"], serde_json::json!(2));
        assert_eq!(event.raw, line);
    }

    #[test]
    fn test_parse_legacy_schema() {
        let event = Event::parse(
            r#"{"timestamp":"2024-01-01T00:00:00Z","type":"observation","observation":"It rained","tags":"weather, outside"}"#,
        )
        .unwrap();

        assert_eq!(event.timestamp(), "2024-01-01T00:00:00Z");
        assert_eq!(event.primary_text(), "It rained");
        assert_eq!(event.tags, vec!["weather", "outside"]);
    }

    #[test]
    fn test_missing_fields_default() {
        let event = Event::parse("{}").unwrap();
        assert!(event.timestamp().is_empty());
        assert!(event.event_type.is_empty());
        assert!(event.tags.is_empty());
        assert!(event.metadata.is_empty());
        assert_eq!(event.primary_text(), NO_CONTENT);
    }

    #[test]
    fn test_both_timestamp_keys_prefer_ts() {
        let event = Event::parse(
            r#"{"ts":"2025-02-02T08:00:00Z","timestamp":"2020-01-01T00:00:00Z","type":"thought"}"#,
        )
        .unwrap();
        assert_eq!(event.timestamp(), "2025-02-02T08:00:00Z");
        assert_eq!(event.display_time(), "2025-02-02 08:00");

        let event =
            Event::parse(r#"{"ts":"","timestamp":"2020-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(event.timestamp(), "2020-01-01T00:00:00Z");
    }

    #[test]
    fn test_null_fields_default() {
        let event = Event::parse(
            r#"{"ts":null,"timestamp":null,"type":null,"content":"still here","tags":null,"metadata":null}"#,
        )
        .unwrap();
        assert!(event.timestamp().is_empty());
        assert!(event.event_type.is_empty());
        assert!(event.tags.is_empty());
        assert!(event.metadata.is_empty());
        assert_eq!(event.primary_text(), "still here");
    }

    #[test]
    fn test_read_all_accepts_drifted_lines() {
        let log = log_with(&[
            r#"{"ts":"2025-01-01T00:00:00Z","timestamp":"2025-01-01T00:00:00Z","type":"thought","content":"a"}"#,
            r#"{"ts":null,"type":null,"content":"b"}"#,
            r#"{"type":"idea","content":"c","metadata":null}"#,
        ]);
        let events = read_all(log.path()).unwrap();
        let texts: Vec<&str> = events.iter().map(Event::primary_text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_content_precedence() {
        let event =
            Event::parse(r#"{"content":"primary","thought":"secondary","question":"q?"}"#).unwrap();
        assert_eq!(event.primary_text(), "primary");

        let event = Event::parse(r#"{"thought":"t","observation":"o","question":"q"}"#).unwrap();
        assert_eq!(event.primary_text(), "t");

        let event = Event::parse(r#"{"observation":"o","question":"q"}"#).unwrap();
        assert_eq!(event.primary_text(), "o");

        let event = Event::parse(r#"{"question":"q"}"#).unwrap();
        assert_eq!(event.primary_text(), "q");
    }

    #[test]
    fn test_empty_content_falls_through() {
        let event = Event::parse(r#"{"content":"","thought":"fallback"}"#).unwrap();
        assert_eq!(event.primary_text(), "fallback");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp("2025-06-01T10:15:42Z"), "2025-06-01 10:15");
        assert_eq!(
            format_timestamp("2025-06-01T10:15:42+02:00"),
            "2025-06-01 10:15"
        );
        assert_eq!(format_timestamp("yesterday-ish"), "yesterday-ish");
        assert_eq!(format_timestamp(""), "");
    }

    #[test]
    fn test_read_all_preserves_order_and_skips_blank_lines() {
        let file = log_with(&[
            r#"{"type":"a","content":"1"}"#,
            "",
            r#"{"type":"b","content":"2"}"#,
            "   ",
            r#"{"type":"c","content":"3"}"#,
        ]);

        let events = read_all(file.path()).unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_read_all_fails_on_malformed_line() {
        let file = log_with(&[r#"{"type":"a"}"#, "{not json", r#"{"type":"c"}"#]);

        let err = read_all(file.path()).unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_read_all_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_all(&dir.path().join("missing.jsonl")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_tail_matches_last_of_read_all() {
        let file = log_with(&[
            r#"{"ts":"2025-01-01T00:00:00Z","type":"thought","content":"first"}"#,
            r#"{"ts":"2025-01-02T00:00:00Z","type":"thought","content":"second"}"#,
            r#"{"ts":"2025-01-03T00:00:00Z","type":"question","question":"third?"}"#,
        ]);

        let all = read_all(file.path()).unwrap();
        let tail = tail_last_event(file.path()).unwrap();
        assert_eq!(Some(&tail), all.last());
    }

    #[test]
    fn test_tail_on_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(tail_last_event(file.path()).is_none());
    }

    #[test]
    fn test_tail_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tail_last_event(&dir.path().join("hot.jsonl")).is_none());
    }

    #[test]
    fn test_tail_ignores_trailing_blank_lines() {
        let file = log_with(&[r#"{"type":"a","content":"last"}"#, "", "  "]);
        let tail = tail_last_event(file.path()).unwrap();
        assert_eq!(tail.primary_text(), "last");
    }

    #[test]
    fn test_tail_window_cutting_last_line_is_soft() {
        let long = format!(r#"{{"type":"a","content":"{}"}}"#, "x".repeat(200));
        let file = log_with(&[r#"{"type":"a","content":"short"}"#, &long]);

        // The window only sees the end of the long line
        assert!(tail_last_event_within(file.path(), 32).is_none());
        // A window covering the whole line recovers it
        let tail = tail_last_event_within(file.path(), 4096).unwrap();
        assert_eq!(tail.content.as_deref().map(str::len), Some(200));
    }

    #[test]
    fn test_tail_without_trailing_newline() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}\n{}", r#"{"content":"a"}"#, r#"{"content":"b"}"#).unwrap();
        file.flush().unwrap();

        assert_eq!(tail_last_event(file.path()).unwrap().primary_text(), "b");
    }

    #[test]
    fn test_count_events() {
        let file = log_with(&[r#"{"type":"a"}"#, "", r#"{"type":"b"}"#]);
        assert_eq!(count_events(file.path()).unwrap(), 2);

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_events(&dir.path().join("none.jsonl")).unwrap(), 0);
    }
}
