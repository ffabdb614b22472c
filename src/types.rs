//! Core domain types for droidusage
//!
//! This module contains the fundamental types used throughout the droidusage
//! library. These types provide strong typing for common concepts like model
//! names, session IDs and token counts, plus the canonical [`Session`] record
//! reconstructed from on-disk data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Strongly-typed session ID wrapper
///
/// Session ids are opaque strings derived from settings filenames
/// (`<id>.settings.json`) and identify one bounded interaction episode.
///
/// # Examples
/// ```
/// use droidusage::types::SessionId;
///
/// let session = SessionId::new("550e8400-e29b-41d4-a716-446655440000");
/// assert_eq!(session.as_str(), "550e8400-e29b-41d4-a716-446655440000");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Token counts for usage tracking
///
/// Tracks all token kinds reported by the assistant runtime. Counts are
/// signed: upstream data occasionally carries negative or corrected values
/// and the pipeline computes through them rather than rejecting the session.
///
/// # Examples
/// ```
/// use droidusage::types::TokenCounts;
///
/// let tokens = TokenCounts::new(100, 50, 10, 5, 0);
/// assert_eq!(tokens.total(), 165);
///
/// let more = TokenCounts::new(50, 25, 5, 2, 0);
/// let combined = tokens + more;
/// assert_eq!(combined.input_tokens, 150);
/// ```
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    /// Input tokens consumed
    #[serde(default)]
    pub input_tokens: i64,
    /// Output tokens generated
    #[serde(default)]
    pub output_tokens: i64,
    /// Cache creation (write) tokens
    #[serde(default)]
    pub cache_creation_tokens: i64,
    /// Cache read tokens
    #[serde(default)]
    pub cache_read_tokens: i64,
    /// Thinking tokens (never priced, reported for completeness)
    #[serde(default)]
    pub thinking_tokens: i64,
}

impl TokenCounts {
    /// Create new TokenCounts
    pub fn new(
        input_tokens: i64,
        output_tokens: i64,
        cache_creation_tokens: i64,
        cache_read_tokens: i64,
        thinking_tokens: i64,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cache_creation_tokens,
            cache_read_tokens,
            thinking_tokens,
        }
    }

    /// Total billable tokens: input + output + cache creation + cache read.
    /// Thinking tokens are excluded from the total.
    pub fn total(&self) -> i64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

impl Add for TokenCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cache_creation_tokens: self.cache_creation_tokens + other.cache_creation_tokens,
            cache_read_tokens: self.cache_read_tokens + other.cache_read_tokens,
            thinking_tokens: self.thinking_tokens + other.thinking_tokens,
        }
    }
}

impl AddAssign for TokenCounts {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_tokens += other.cache_creation_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.thinking_tokens += other.thinking_tokens;
    }
}

/// Canonical session record, reconstructed from a settings snapshot merged
/// with shared-log facts and transcript metadata.
///
/// Constructed once by the session reader and treated as immutable, except
/// for `cost` and `total_tokens` which are derived views attached by the
/// cost calculator after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier (settings filename stem)
    pub id: SessionId,
    /// Session start instant; `None` when no source supplied a parsable
    /// timestamp ("undated" sessions stay aggregable)
    pub date: Option<DateTime<Utc>>,
    /// Normalized model name (lowercase, vendor prefixes stripped)
    pub model: String,
    /// Provider name, or "unknown"
    pub provider: String,
    /// Token counts
    #[serde(flatten)]
    pub tokens: TokenCounts,
    /// Wall-clock assistant-active duration in milliseconds
    pub active_time_ms: i64,
    /// Count of genuine user text turns (excludes system-injected reminders)
    pub user_interactions: u64,
    /// Derived: input + output + cache creation + cache read
    pub total_tokens: i64,
    /// Derived: USD cost attached by the cost calculator
    pub cost: f64,
}

impl Session {
    /// Cache hit rate: cache reads over all prospective input tokens.
    /// Zero when the session carries no input at all.
    pub fn cache_hit_rate(&self) -> f64 {
        let input = self.tokens.input_tokens.max(0) as f64;
        let cache_read = self.tokens.cache_read_tokens.max(0) as f64;
        if input + cache_read > 0.0 {
            cache_read / (input + cache_read)
        } else {
            0.0
        }
    }
}

/// Sentinel provider for sessions whose backing route could not be resolved
pub const UNKNOWN_PROVIDER: &str = "unknown";

/// Sentinel model for sessions whose model could not be resolved
pub const UNKNOWN_MODEL: &str = "unknown";

/// Normalize a model identifier to its canonical pricing key.
///
/// Lowercases, collapses the `custom:glm-` vendor spelling to `glm-` and
/// strips leading `custom:` prefixes. Collapsing can expose a new prefix, so
/// the rewrite iterates to a fixed point, which also makes the function
/// idempotent for arbitrary input.
///
/// # Examples
/// ```
/// use droidusage::types::normalize_model_name;
///
/// assert_eq!(normalize_model_name("custom:glm-4.6"), "glm-4.6");
/// assert_eq!(normalize_model_name("GPT-4o"), "gpt-4o");
/// ```
pub fn normalize_model_name(model: &str) -> String {
    let mut name = model.to_lowercase();
    loop {
        let collapsed = name.replace("custom:glm-", "glm-");
        let stripped = collapsed
            .strip_prefix("custom:")
            .map(str::to_string)
            .unwrap_or(collapsed);
        if stripped == name {
            return name;
        }
        name = stripped;
    }
}
