//! Shared-log indexer
//!
//! The shared streaming log interleaves events for every session in one
//! append-only file. Scanning it per session would be quadratic, so this
//! module parses the file exactly once and builds an index from session id
//! to that session's accumulated facts: token sums, the first model
//! announcement and the first timestamp.
//!
//! Each line is attempted independently as JSON. Lines may carry a
//! bracketed timestamp prefix (`[2024-01-01T00:00:00.000Z] {...}`) before
//! the JSON payload; the prefix supplies the line's timestamp when present.
//! Lines that contain no JSON object, or whose object carries no session
//! id, are skipped. Numeric fields sum across all of a session's lines;
//! the first non-null model id and the first timestamp win.
//!
//! This indexed bulk-sum pass is the only log-parsing strategy in the
//! crate; a missing or unreadable log file simply produces an empty index.

use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Accumulated log-derived facts for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFacts {
    /// Sum of `inputTokens` across the session's log lines
    pub input_tokens: i64,
    /// Sum of `outputTokens`
    pub output_tokens: i64,
    /// Sum of `cacheReadInputTokens`
    pub cache_read_tokens: i64,
    /// First model id announced for the session
    pub model_id: Option<String>,
    /// First timestamp observed for the session
    pub first_timestamp: Option<DateTime<Utc>>,
}

/// Index from session id to accumulated [`LogFacts`]
///
/// Owned by exactly one batch-load call: built fully, then shared
/// read-only, then dropped when the call returns.
#[derive(Debug, Default)]
pub struct SharedLogIndex {
    sessions: HashMap<String, LogFacts>,
}

impl SharedLogIndex {
    /// An index with no entries (missing or unreadable log)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the index from the full log text in a single pass
    pub fn build(log_text: &str) -> Self {
        let mut sessions: HashMap<String, LogFacts> = HashMap::new();

        for line in log_text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (value, line_timestamp) = match parse_log_line(line) {
                Some(parsed) => parsed,
                None => continue,
            };

            let Some(session_id) = find_string(&value, "sessionId") else {
                continue;
            };

            let facts = sessions.entry(session_id.to_string()).or_default();

            if let Some(tokens) = find_i64(&value, "inputTokens") {
                facts.input_tokens += tokens;
            }
            if let Some(tokens) = find_i64(&value, "outputTokens") {
                facts.output_tokens += tokens;
            }
            if let Some(tokens) = find_i64(&value, "cacheReadInputTokens") {
                facts.cache_read_tokens += tokens;
            }

            if facts.model_id.is_none() {
                if let Some(model) = find_string(&value, "modelId") {
                    facts.model_id = Some(model.to_string());
                }
            }

            if facts.first_timestamp.is_none() {
                facts.first_timestamp = line_timestamp.or_else(|| {
                    find_string(&value, "timestamp")
                        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                        .map(|dt| dt.with_timezone(&Utc))
                });
            }
        }

        debug!("Indexed shared log: {} sessions", sessions.len());
        Self { sessions }
    }

    /// Look up the facts for a session
    pub fn get(&self, id: &SessionId) -> Option<&LogFacts> {
        self.sessions.get(id.as_str())
    }

    /// Number of sessions present in the log
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the index holds no sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Split a log line into its JSON payload and optional bracket timestamp.
///
/// Accepts both plain JSON lines and lines shaped
/// `[<ISO instant>] {json...}`.
fn parse_log_line(line: &str) -> Option<(Value, Option<DateTime<Utc>>)> {
    if let Ok(value) = serde_json::from_str::<Value>(line) {
        if value.is_object() {
            return Some((value, None));
        }
    }

    let timestamp = line.strip_prefix('[').and_then(|rest| {
        let end = rest.find(']')?;
        DateTime::parse_from_rfc3339(&rest[..end])
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    });

    let json_start = line.find('{')?;
    let value: Value = serde_json::from_str(&line[json_start..]).ok()?;
    if value.is_object() {
        Some((value, timestamp))
    } else {
        None
    }
}

/// Depth-first search for the first string value under `key`
fn find_string<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(Value::as_str) {
                return Some(found);
            }
            map.values().find_map(|v| find_string(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_string(v, key)),
        _ => None,
    }
}

/// Depth-first search for the first integer value under `key`
fn find_i64(value: &Value, key: &str) -> Option<i64> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key).and_then(Value::as_i64) {
                return Some(found);
            }
            map.values().find_map(|v| find_i64(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_i64(v, key)),
        _ => None,
    }
}
