//! Session reader: merges a settings snapshot, shared-log facts and
//! transcript metadata into one canonical [`Session`]
//!
//! The two data sources overlap and neither is fully reliable. The settings
//! snapshot always exists for a live session and carries cache-creation,
//! thinking-token and active-time figures the log never sees; the shared
//! log captures streaming token deltas at a finer grain and is considered
//! more authoritative for input, output and cache-read counts. Because log
//! coverage can be partial in either direction, the merge takes
//! `max(log, settings)` per field rather than a blind override.
//!
//! A session whose settings file is missing or not valid JSON reads as
//! `None` — the caller drops it and moves on; nothing here panics or
//! aborts a batch.

use crate::data_loader::DataLoader;
use crate::log_index::{LogFacts, SharedLogIndex};
use crate::types::{
    normalize_model_name, Session, SessionId, TokenCounts, UNKNOWN_MODEL, UNKNOWN_PROVIDER,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Marker substring identifying system-injected reminder turns in a
/// transcript; user messages containing it are not genuine prompts.
const SYSTEM_REMINDER_MARKER: &str = "<system-reminder>";

/// On-disk shape of a session settings snapshot (fields we consume)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSettings {
    #[serde(default)]
    provider_lock: Option<String>,
    #[serde(default)]
    provider_lock_timestamp: Option<String>,
    #[serde(default)]
    assistant_active_time_ms: Option<i64>,
    #[serde(default)]
    token_usage: Option<TokenCounts>,
}

/// Reads and reconciles one session at a time
pub struct SessionReader<'a> {
    loader: &'a DataLoader,
}

impl<'a> SessionReader<'a> {
    /// Create a reader over a data loader
    pub fn new(loader: &'a DataLoader) -> Self {
        Self { loader }
    }

    /// Reconstruct the canonical session for `id`.
    ///
    /// `index` supplies shared-log facts when available; without it the
    /// reconstruction degrades to settings plus transcript metadata.
    /// `count_prompts` controls the transcript scan for user-interaction
    /// counting, the most expensive step — views that do not report prompt
    /// counts skip it.
    ///
    /// Returns `None` when the settings file is missing or unparsable.
    pub async fn read(
        &self,
        id: &SessionId,
        index: Option<&SharedLogIndex>,
        count_prompts: bool,
    ) -> Option<Session> {
        let settings_text = self.loader.read_session_settings(id).await?;
        let settings: SessionSettings = match serde_json::from_str(&settings_text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not parse session {id}: {e}");
                return None;
            }
        };

        let facts = index.and_then(|ix| ix.get(id));

        let tokens = merge_tokens(&settings, facts);

        // The transcript is only opened when something still needs it.
        let log_model = facts.and_then(|f| f.model_id.as_deref());
        let log_timestamp = facts.and_then(|f| f.first_timestamp);
        let needs_transcript =
            count_prompts || log_model.is_none() || log_timestamp.is_none();
        let transcript = if needs_transcript {
            self.loader.read_session_transcript(id).await
        } else {
            None
        };
        let transcript = transcript.as_deref();

        let (model, model_from_log) = resolve_model(log_model, transcript, &settings);
        let provider = resolve_provider(&settings, &model, model_from_log);

        let date = log_timestamp
            .or_else(|| transcript.and_then(first_transcript_timestamp))
            .or_else(|| {
                settings
                    .provider_lock_timestamp
                    .as_deref()
                    .and_then(parse_instant)
            });

        let user_interactions = if count_prompts {
            transcript.map(count_user_prompts).unwrap_or(0)
        } else {
            0
        };

        Some(Session {
            id: id.clone(),
            date,
            model,
            provider,
            tokens,
            active_time_ms: settings.assistant_active_time_ms.unwrap_or(0),
            user_interactions,
            total_tokens: tokens.total(),
            cost: 0.0,
        })
    }
}

/// Merge settings and log token counts.
///
/// Input, output and cache-read take `max(log, settings)`; cache-creation
/// and thinking tokens only ever appear in settings.
fn merge_tokens(settings: &SessionSettings, facts: Option<&LogFacts>) -> TokenCounts {
    let from_settings = settings.token_usage.unwrap_or_default();
    let Some(facts) = facts else {
        return from_settings;
    };

    TokenCounts {
        input_tokens: facts.input_tokens.max(from_settings.input_tokens),
        output_tokens: facts.output_tokens.max(from_settings.output_tokens),
        cache_creation_tokens: from_settings.cache_creation_tokens,
        cache_read_tokens: facts.cache_read_tokens.max(from_settings.cache_read_tokens),
        thinking_tokens: from_settings.thinking_tokens,
    }
}

/// Resolve the session's model. Returns the normalized name and whether it
/// came from the shared log (which gates provider inference).
fn resolve_model(
    log_model: Option<&str>,
    transcript: Option<&[String]>,
    settings: &SessionSettings,
) -> (String, bool) {
    if let Some(model_id) = log_model {
        return (normalize_model_name(model_id), true);
    }

    if let Some(lines) = transcript {
        if let Some(model) = lines
            .iter()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str::<Value>(line).ok())
            .and_then(|value| find_string(&value, "model").map(str::to_string))
        {
            return (normalize_model_name(&model), false);
        }
    }

    let fallback = match settings.provider_lock.as_deref() {
        Some("anthropic") => "claude-3-5-sonnet-20241022",
        Some("openai") => "gpt-4o",
        Some("zhipuai") | Some("zai") | Some("fireworks")
        | Some("generic-chat-completion-api") => "glm-4",
        _ => UNKNOWN_MODEL,
    };
    (fallback.to_string(), false)
}

/// Resolve the provider. An explicitly locked provider is never overridden;
/// inference from the model name only fills a missing or unknown one, and
/// only when the model was resolved from the shared log.
fn resolve_provider(settings: &SessionSettings, model: &str, model_from_log: bool) -> String {
    let locked = settings
        .provider_lock
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(UNKNOWN_PROVIDER);

    if model_from_log && locked == UNKNOWN_PROVIDER {
        if model.contains("glm") {
            return "zhipuai".to_string();
        }
        if model.contains("gpt") {
            return "openai".to_string();
        }
        if model.contains("claude") {
            return "anthropic".to_string();
        }
    }

    locked.to_string()
}

/// Parse a full ISO-8601 instant; anything unparsable becomes `None`
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// First timestamp carried by the transcript.
///
/// The first record that has a `timestamp` field decides: if its value
/// does not parse, the session stays undated rather than borrowing a
/// later record's time.
fn first_transcript_timestamp(lines: &[String]) -> Option<DateTime<Utc>> {
    for line in lines {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if let Some(raw) = find_string(&value, "timestamp") {
            return parse_instant(raw);
        }
    }
    None
}

/// Count genuine user text turns in a transcript.
///
/// A turn counts when it is a `message` record with role `user` carrying at
/// least one text block whose text is not a system-injected reminder.
fn count_user_prompts(lines: &[String]) -> u64 {
    let mut count = 0;
    for line in lines {
        let Ok(value) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        let Some(message) = value.get("message") else {
            continue;
        };
        if message.get("role").and_then(Value::as_str) != Some("user") {
            continue;
        }
        let has_user_text = message
            .get("content")
            .and_then(Value::as_array)
            .is_some_and(|content| {
                content.iter().any(|item| {
                    item.get("type").and_then(Value::as_str) == Some("text")
                        && item
                            .get("text")
                            .and_then(Value::as_str)
                            .is_some_and(|text| !text.contains(SYSTEM_REMINDER_MARKER))
                })
            });
        if has_user_text {
            count += 1;
        }
    }
    count
}

/// Depth-first search for the first string value under `key`
fn find_string<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::{SETTINGS_SUFFIX, TRANSCRIPT_SUFFIX};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        loader: DataLoader,
        sessions_dir: std::path::PathBuf,
    }

    async fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let sessions_dir = temp.path().join("sessions");
        tokio::fs::create_dir_all(&sessions_dir).await.unwrap();
        Fixture {
            loader: DataLoader::new(&sessions_dir),
            sessions_dir,
            _temp: temp,
        }
    }

    impl Fixture {
        async fn write_settings(&self, id: &str, json: &str) {
            tokio::fs::write(
                self.sessions_dir.join(format!("{id}{SETTINGS_SUFFIX}")),
                json,
            )
            .await
            .unwrap();
        }

        async fn write_transcript(&self, id: &str, lines: &str) {
            tokio::fs::write(
                self.sessions_dir.join(format!("{id}{TRANSCRIPT_SUFFIX}")),
                lines,
            )
            .await
            .unwrap();
        }
    }

    const BASIC_SETTINGS: &str = r#"{
        "providerLock": "zhipuai",
        "providerLockTimestamp": "2024-06-01T12:00:00Z",
        "assistantActiveTimeMs": 45000,
        "tokenUsage": {
            "inputTokens": 1000,
            "outputTokens": 400,
            "cacheCreationTokens": 200,
            "cacheReadTokens": 50,
            "thinkingTokens": 10
        }
    }"#;

    #[tokio::test]
    async fn test_settings_only_session() {
        let fx = fixture().await;
        fx.write_settings("s1", BASIC_SETTINGS).await;

        let reader = SessionReader::new(&fx.loader);
        let session = reader.read(&SessionId::new("s1"), None, false).await.unwrap();

        assert_eq!(session.provider, "zhipuai");
        assert_eq!(session.model, "glm-4"); // provider fallback
        assert_eq!(session.tokens.input_tokens, 1000);
        assert_eq!(session.tokens.thinking_tokens, 10);
        assert_eq!(session.active_time_ms, 45000);
        assert_eq!(session.total_tokens, 1650);
        assert_eq!(
            session.date.unwrap().to_rfc3339(),
            "2024-06-01T12:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_log_facts_take_max_per_field() {
        let fx = fixture().await;
        fx.write_settings("s1", BASIC_SETTINGS).await;

        // Log saw more output but less input than the snapshot.
        let log = r#"{"sessionId":"s1","modelId":"custom:glm-4.6","inputTokens":600,"outputTokens":900,"cacheReadInputTokens":80,"timestamp":"2024-06-01T09:30:00Z"}"#;
        let index = SharedLogIndex::build(log);

        let reader = SessionReader::new(&fx.loader);
        let session = reader
            .read(&SessionId::new("s1"), Some(&index), false)
            .await
            .unwrap();

        assert_eq!(session.tokens.input_tokens, 1000); // settings wins
        assert_eq!(session.tokens.output_tokens, 900); // log wins
        assert_eq!(session.tokens.cache_read_tokens, 80); // log wins
        assert_eq!(session.tokens.cache_creation_tokens, 200); // settings only
        assert_eq!(session.model, "glm-4.6"); // normalized log model
        // Log timestamp precedes the settings timestamp in the resolution order.
        assert_eq!(
            session.date.unwrap().to_rfc3339(),
            "2024-06-01T09:30:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_provider_inference_does_not_override_lock() {
        let fx = fixture().await;
        fx.write_settings(
            "locked",
            r#"{"providerLock": "fireworks", "tokenUsage": {}}"#,
        )
        .await;
        fx.write_settings("open", r#"{"tokenUsage": {}}"#).await;

        let log = concat!(
            r#"{"sessionId":"locked","modelId":"glm-4"}"#,
            "\n",
            r#"{"sessionId":"open","modelId":"claude-3-5-sonnet-20241022"}"#,
        );
        let index = SharedLogIndex::build(log);
        let reader = SessionReader::new(&fx.loader);

        let locked = reader
            .read(&SessionId::new("locked"), Some(&index), false)
            .await
            .unwrap();
        assert_eq!(locked.provider, "fireworks");

        let open = reader
            .read(&SessionId::new("open"), Some(&index), false)
            .await
            .unwrap();
        assert_eq!(open.provider, "anthropic");
    }

    #[tokio::test]
    async fn test_model_from_transcript_first_line() {
        let fx = fixture().await;
        fx.write_settings("s1", r#"{"tokenUsage": {}}"#).await;
        fx.write_transcript(
            "s1",
            concat!(
                r#"{"type":"meta","model":"GPT-4o","timestamp":"2024-02-02T08:00:00Z"}"#,
                "\n",
                r#"{"type":"meta","model":"other-model"}"#,
            ),
        )
        .await;

        let reader = SessionReader::new(&fx.loader);
        let session = reader.read(&SessionId::new("s1"), None, false).await.unwrap();
        assert_eq!(session.model, "gpt-4o");
        // Transcript model resolution never infers a provider.
        assert_eq!(session.provider, "unknown");
        assert_eq!(
            session.date.unwrap().to_rfc3339(),
            "2024-02-02T08:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_unparsable_timestamp_yields_undated_session() {
        let fx = fixture().await;
        fx.write_settings(
            "s1",
            r#"{"providerLockTimestamp": "definitely not a date", "tokenUsage": {}}"#,
        )
        .await;

        let reader = SessionReader::new(&fx.loader);
        let session = reader.read(&SessionId::new("s1"), None, false).await.unwrap();
        assert!(session.date.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_settings_reads_as_none() {
        let fx = fixture().await;
        fx.write_settings("bad", "{ this is not json").await;

        let reader = SessionReader::new(&fx.loader);
        assert!(reader.read(&SessionId::new("bad"), None, false).await.is_none());
        assert!(reader.read(&SessionId::new("absent"), None, false).await.is_none());
    }

    #[tokio::test]
    async fn test_user_prompt_counting_skips_reminders() {
        let fx = fixture().await;
        fx.write_settings("s1", BASIC_SETTINGS).await;
        fx.write_transcript(
            "s1",
            concat!(
                r#"{"type":"message","message":{"role":"user","content":[{"type":"text","text":"hello"}]}}"#,
                "\n",
                r#"{"type":"message","message":{"role":"user","content":[{"type":"text","text":"<system-reminder>do not count</system-reminder>"}]}}"#,
                "\n",
                r#"{"type":"message","message":{"role":"assistant","content":[{"type":"text","text":"hi"}]}}"#,
                "\n",
                r#"{"type":"message","message":{"role":"user","content":[{"type":"tool_result","content":"output"}]}}"#,
                "\n",
                "not json\n",
                r#"{"type":"message","message":{"role":"user","content":[{"type":"text","text":"second question"}]}}"#,
            ),
        )
        .await;

        let reader = SessionReader::new(&fx.loader);
        let counted = reader.read(&SessionId::new("s1"), None, true).await.unwrap();
        assert_eq!(counted.user_interactions, 2);

        let skipped = reader.read(&SessionId::new("s1"), None, false).await.unwrap();
        assert_eq!(skipped.user_interactions, 0);
    }
}
